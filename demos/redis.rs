//! This is an example of using Redis sessions, along with a custom provider registry.

use rocket::{http::Status, routes, serde::json::Json};
use rocket_pluggable_session::{
    provider::redis::RedisProvider, PluggableSession, ProviderRegistry, Session,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    user_id: u32,
    name: String,
}

#[rocket::launch]
fn basic() -> _ {
    // Register the providers the app can choose from. The built-in `redis` provider uses
    // the `session:` key prefix, so register another one with a custom prefix.
    let mut registry = ProviderRegistry::with_defaults();
    registry.register("redis-app", RedisProvider::with_prefix("my-app:sess:"));

    // The Redis provider is configured as `address,pool_size,password,db` or a URL.
    // The connection pool is created on ignite, and closed on shutdown.
    let session_fairing = PluggableSession::builder()
        .registry(registry)
        .provider("redis-app")
        .with_options(|opt| {
            // customize the cookie name
            opt.cookie_name = "my-cookie-name".to_string();
            opt.provider_config = "my-redis-server:6379,4".to_string();
            // more options available:
            // opt.max_lifetime = 60 * 60 * 24 * 7; // session lifetime in seconds
            // opt.domain = Some("example.com".to_string()); // cookie domain
            // etc...
        })
        .build();

    rocket::build()
        .attach(session_fairing)
        .mount("/", routes![login, logout, user])
}

#[derive(Deserialize)]
struct LoginData {
    username: String,
    password: String,
}

#[rocket::post("/login", data = "<data>")]
async fn login(
    session: Session<'_>,
    data: Json<LoginData>,
) -> Result<&'static str, (Status, String)> {
    if session.get::<User>("user").is_some() {
        return Err((Status::BadRequest, "Already logged in".to_string()));
    }

    // Implement actual login logic here
    if data.username == "rossg" && data.password == "dinosaurs" {
        let user = User {
            user_id: 1,
            name: "Ross".to_string(),
        };
        session
            .regenerate()
            .await
            .and_then(|_| session.set("user", user))
            .map_err(|e| (Status::InternalServerError, e.to_string()))?;
        Ok("Logged in")
    } else {
        Err((Status::Unauthorized, "Invalid credentials".to_string()))
    }
}

#[rocket::get("/user")]
async fn user(session: Session<'_>) -> Result<String, (Status, &'static str)> {
    match session.get::<User>("user") {
        Some(user) => Ok(format!("User ID: {}", user.user_id)),
        None => Err((Status::Unauthorized, "Not logged in")),
    }
}

#[rocket::post("/logout")]
async fn logout(session: Session<'_>) -> Result<&'static str, (Status, String)> {
    session
        .destroy()
        .await
        .map_err(|e| (Status::InternalServerError, e.to_string()))?;
    Ok("Logged out")
}
