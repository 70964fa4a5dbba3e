//! This is a basic example of how to use PluggableSession. To demonstrate switching
//! providers through configuration, sessions are kept in memory for a debug build and
//! as JSON files on disk for a release build.

use rocket::{http::Status, routes, serde::json::Json};
use rocket_pluggable_session::{PluggableSession, Session};
use serde::{Deserialize, Serialize};

// Session values can be anything that serializes to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    user_id: u32,
    name: String,
}

#[rocket::launch]
fn basic() -> _ {
    // Use the in-memory provider for development/debug mode, and files for production.
    // The configuration would usually come from a config file.
    let (provider, config) = if cfg!(debug_assertions) {
        ("memory", r#"{"cookieName":"my-cookie-name","gcLifetime":3600}"#)
    } else {
        (
            "file",
            r#"{
                "cookieName": "my-cookie-name",
                "gcLifetime": 3600,
                "maxLifetime": 86400,
                "secure": true,
                "providerConfig": "./data/sessions"
            }"#,
        )
    };
    let session_fairing = PluggableSession::builder()
        .provider(provider)
        .config(config)
        .build();

    // Attach the session fairing and mount the routes
    rocket::build()
        .attach(session_fairing)
        .mount("/", routes![login, logout, user, visits])
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
) -> Result<&'static str, (Status, &'static str)> {
    if session.get::<User>("user").is_some() {
        return Err((Status::BadRequest, "Already logged in"));
    }

    // Implement actual login logic here
    if data.username == "rossg" && data.password == "dinosaurs" {
        // Issue a new session ID when privileges change
        session
            .regenerate()
            .await
            .map_err(|_| (Status::InternalServerError, "Session error"))?;
        let user = User {
            user_id: 1,
            name: "Ross".to_string(),
        };
        session
            .set("user", user)
            .map_err(|_| (Status::InternalServerError, "Session error"))?;
        Ok("Logged in")
    } else {
        Err((Status::Unauthorized, "Invalid credentials"))
    }
}

#[rocket::get("/user")]
fn user(session: Session) -> Result<String, (Status, &'static str)> {
    match session.get::<User>("user") {
        Some(user) => Ok(format!("User ID: {} ({})", user.user_id, user.name)),
        None => Err((Status::Unauthorized, "Not logged in")),
    }
}

#[rocket::get("/visits")]
async fn visits(session: Session<'_>) -> String {
    let visits = session.get::<u32>("visits").unwrap_or_default() + 1;
    session.set("visits", visits).ok();
    let active = session.count().await.unwrap_or_default();
    format!("Visit #{visits} ({active} active sessions)")
}

#[rocket::post("/logout")]
async fn logout(session: Session<'_>) -> Result<&'static str, (Status, String)> {
    session
        .destroy()
        .await
        .map_err(|e| (Status::InternalServerError, e.to_string()))?;
    Ok("Logged out")
}
