#[macro_use]
extern crate rocket;

use rocket::{
    async_trait,
    http::{Cookie, CookieJar, Status},
    local::blocking::Client,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Build, Request, Rocket,
};
use rocket_pluggable_session::{
    error::{SessionError, SessionResult},
    get_store,
    provider::SessionProvider,
    PluggableSession, ProviderRegistry, Session, SessionStore,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, FromFormField)]
#[serde(rename_all = "lowercase")]
enum UserRole {
    User,
    Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct User {
    name: String,
    role: UserRole,
}

struct Admin {
    user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = &'r str;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // The session was already started by the fairing
        match get_store(req).and_then(|store| store.get::<User>("user")) {
            Some(user) => Outcome::Success(user),
            None => Outcome::Error((Status::Unauthorized, "Not logged in")),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = &'r str;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user = try_outcome!(req.guard::<User>().await);
        if user.role == UserRole::Admin {
            Outcome::Success(Admin { user })
        } else {
            Outcome::Forward(Status::Forbidden)
        }
    }
}

#[post("/login?<name>&<role>")]
async fn login(name: &str, role: UserRole, session: Session<'_>) -> &'static str {
    session.regenerate().await.unwrap();
    let user = User {
        name: name.to_owned(),
        role,
    };
    session.set("user", user).unwrap();
    "Logged in"
}

#[post("/logout")]
async fn logout(session: Session<'_>) -> &'static str {
    session.destroy().await.unwrap();
    "Logged out"
}

#[get("/user")]
fn get_user(user: User) -> String {
    format!("Logged in as {}", user.name)
}

#[get("/admin")]
fn admin_only_route(admin: Admin) -> String {
    format!("Admin access granted to {}", admin.user.name)
}

#[get("/health")]
fn health() -> &'static str {
    "OK"
}

#[get("/visit")]
fn visit(session: Session) -> String {
    session.id().unwrap_or_default()
}

fn create_rocket() -> Rocket<Build> {
    rocket::build()
        .attach(PluggableSession::default())
        .mount("/", routes![get_user, admin_only_route, login, logout])
}

#[test]
fn test_unauthorized_access() {
    let client = Client::tracked(create_rocket()).unwrap();
    let response = client.get("/user").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn test_login_logout_flow() {
    let client = Client::tracked(create_rocket()).unwrap();

    let login_response = client.post("/login?name=alice&role=user").dispatch();
    assert_eq!(login_response.status(), Status::Ok);

    let user_response = client.get("/user").dispatch();
    assert_eq!(user_response.status(), Status::Ok);
    assert_eq!(user_response.into_string(), Some("Logged in as alice".into()));

    let logout_response = client.post("/logout").dispatch();
    assert_eq!(logout_response.status(), Status::Ok);

    let final_response = client.get("/user").dispatch();
    assert_eq!(final_response.status(), Status::Unauthorized);
}

#[test]
fn test_admin_access() {
    let client = Client::tracked(create_rocket()).unwrap();

    client.post("/login?name=root&role=admin").dispatch();
    let response = client.get("/admin").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().unwrap(), "Admin access granted to root");
}

#[test]
fn test_non_admin_access() {
    let client = Client::tracked(create_rocket()).unwrap();

    client.post("/login?name=bob&role=user").dispatch();
    let response = client.get("/admin").dispatch();
    assert_eq!(response.status(), Status::Forbidden);
}

/// Provider whose backend is always unreachable
struct UnreachableProvider;

#[async_trait]
impl SessionProvider for UnreachableProvider {
    async fn init(&mut self, _max_lifetime: u64, _config: &str) -> SessionResult<()> {
        Ok(())
    }

    async fn read(&self, _id: &str, _cookie_jar: &CookieJar<'_>) -> SessionResult<SessionStore> {
        Err(SessionError::Backend("connection refused".into()))
    }

    async fn exists(&self, _id: &str) -> bool {
        false
    }

    async fn regenerate(
        &self,
        _old_id: &str,
        _new_id: &str,
        _cookie_jar: &CookieJar<'_>,
    ) -> SessionResult<SessionStore> {
        Err(SessionError::Backend("connection refused".into()))
    }

    async fn destroy(&self, _id: &str, _cookie_jar: &CookieJar<'_>) -> SessionResult<()> {
        Ok(())
    }

    async fn release(&self, _store: &SessionStore) -> SessionResult<Option<Cookie<'static>>> {
        Ok(None)
    }

    async fn count(&self) -> SessionResult<usize> {
        Ok(0)
    }

    async fn gc(&self) -> usize {
        0
    }
}

#[test]
fn test_failed_start_is_server_error() {
    let mut registry = ProviderRegistry::new();
    registry.register("unreachable", UnreachableProvider);
    let rocket = rocket::build()
        .attach(
            PluggableSession::builder()
                .registry(registry)
                .provider("unreachable")
                .build(),
        )
        .mount("/", routes![visit, health, get_user]);
    let client = Client::tracked(rocket).unwrap();

    assert_eq!(client.get("/visit").dispatch().status(), Status::InternalServerError);
    assert_eq!(client.get("/user").dispatch().status(), Status::Unauthorized);
    assert_eq!(client.get("/health").dispatch().status(), Status::Ok);
}
