use std::sync::{Arc, Mutex, MutexGuard};

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::{error::SessionError, store::SessionStore, Session, SessionManager};

/// Session state of one request, kept in Rocket's request-local cache
pub(crate) struct RequestSession {
    /// The active store. `None` once the session is destroyed or released.
    store: Mutex<Option<Arc<SessionStore>>>,
    /// Error (if any) when starting the session
    error: Option<SessionError>,
}

impl RequestSession {
    pub(crate) fn empty() -> Self {
        Self {
            store: Mutex::default(),
            error: None,
        }
    }

    pub(crate) fn store(&self) -> Option<Arc<SessionStore>> {
        self.lock().clone()
    }

    pub(crate) fn set_store(&self, store: Option<Arc<SessionStore>>) {
        *self.lock() = store;
    }

    pub(crate) fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Take the store for release at the end of the request
    pub(crate) fn take(&self) -> Option<Arc<SessionStore>> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<SessionStore>>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Start the session of a request, to be cached for the rest of the request
pub(crate) async fn start_session(manager: &SessionManager, req: &Request<'_>) -> RequestSession {
    let session_req = manager.request(req);
    match manager.start(&session_req).await {
        Ok(store) => {
            rocket::debug!("Started session '{}'", store.id());
            RequestSession {
                store: Mutex::new(Some(Arc::new(store))),
                error: None,
            }
        }
        Err(e) => {
            rocket::error!("Failed to start session: {e}");
            RequestSession {
                store: Mutex::default(),
                error: Some(e),
            }
        }
    }
}

/// Get the session store of the current request, if a session was started and
/// is still active.
pub fn get_store(req: &Request<'_>) -> Option<Arc<SessionStore>> {
    req.local_cache(RequestSession::empty).store()
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session<'r> {
    /// The session couldn't be started (e.g. the random source failed)
    type Error = &'r SessionError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let manager = get_manager(req.rocket());
        let state: &RequestSession = req
            .local_cache_async(start_session(manager, req))
            .await;

        match &state.error {
            Some(e) => Outcome::Error((Status::InternalServerError, e)),
            None => Outcome::Success(Session::new(state, manager.request(req), manager)),
        }
    }
}

/// Get the session manager from Rocket state
#[inline(always)]
fn get_manager(rocket: &rocket::Rocket<rocket::Orbit>) -> &SessionManager {
    rocket
        .state::<Arc<SessionManager>>()
        .map(|manager| manager.as_ref())
        .unwrap_or_else(|| panic!("The PluggableSession fairing should be attached to the server"))
}

/// If using rocket-okapi, this implements OpenApiFromRequest for Session to ignore the request guard
#[cfg(feature = "rocket_okapi")]
impl<'r> rocket_okapi::request::OpenApiFromRequest<'r> for Session<'r> {
    fn from_request_input(
        _gen: &mut rocket_okapi::gen::OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<rocket_okapi::request::RequestHeaderInput> {
        Ok(rocket_okapi::request::RequestHeaderInput::None)
    }
}
