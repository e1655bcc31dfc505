use super::*;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use actix_web::http::header::LOCATION;
use actix_web::web;

/// Mounts the authentication and account settings routes.
pub fn routes<B: Backend + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/logout", web::get().to(logout))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me::<B>))
            .route("/initiate-link/{provider}", web::get().to(initiate_link))
            .route("/{provider}/login", web::get().to(login))
            .route("/{provider}/callback", web::get().to(callback::<B>)),
    )
    .service(
        web::scope("/settings")
            .route("/linked-accounts", web::get().to(linked_accounts::<B>))
            .route("/linked-accounts/{provider}", web::delete().to(unlink_account::<B>))
            .route("/profile", web::put().to(update_profile::<B>))
            .route("/theme", web::put().to(update_theme::<B>)),
    );
}

/// Starts a sign-in with `provider`.
pub async fn login(
    req: HttpRequest,
    path: web::Path<String>,
    sessions: web::Data<Sessions>,
    providers: web::Data<Providers>,
) -> Result<HttpResponse, AuthError> {
    let provider = providers.get(&path)?;
    let mut session = sessions.read(&req);
    let state = session.challenge();
    Ok(HttpResponse::Found()
        .cookie(sessions.write(&session)?)
        .append_header((LOCATION, provider.authorize(&state)))
        .finish())
}

/// Starts attaching `provider` to the signed-in member.
pub async fn initiate_link(
    auth: Auth,
    req: HttpRequest,
    path: web::Path<String>,
    sessions: web::Data<Sessions>,
    providers: web::Data<Providers>,
) -> Result<HttpResponse, AuthError> {
    let provider = providers.get(&path)?;
    let mut session = sessions.read(&req);
    session.link(auth.user(), provider.name());
    let state = session.challenge();
    log::info!("user {} started linking {}", auth.user(), provider.name());
    Ok(HttpResponse::Found()
        .cookie(sessions.write(&session)?)
        .append_header((LOCATION, provider.authorize(&state)))
        .finish())
}

/// Completes a provider round trip.
///
/// The cookie is rewritten whatever the result so that a consumed
/// linking intent and `state` nonce stay consumed.
pub async fn callback<B: Backend + 'static>(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
    backend: web::Data<B>,
    sessions: web::Data<Sessions>,
    providers: web::Data<Providers>,
    frontend: web::Data<Frontend>,
) -> HttpResponse {
    let mut session = sessions.read(&req);
    let result = complete(&**backend, &providers, &path, &query, &mut session).await;
    session.clear_linking();
    let cookie = match sessions.write(&session) {
        Ok(cookie) => cookie,
        Err(e) => return e.error_response(),
    };
    match result {
        Ok(outcome) => HttpResponse::Found()
            .cookie(cookie)
            .append_header((LOCATION, outcome.redirect(&frontend.0)))
            .finish(),
        Err(e) => {
            log::warn!("{} callback failed: {}", path.as_str(), e);
            let mut response = e.error_response();
            if let Err(e) = response.add_cookie(&cookie) {
                log::error!("could not attach session cookie: {}", e);
            }
            response
        }
    }
}

async fn complete<B: Backend>(
    backend: &B,
    providers: &Providers,
    name: &str,
    query: &CallbackQuery,
    session: &mut Session,
) -> Result<Outcome, AuthError> {
    let provider = providers.get(name)?;
    let state = query.state.as_deref().unwrap_or_default();
    if !session.verify(state) {
        return Err(AuthError::Invalid("invalid or expired sign-in state".to_string()));
    }
    if let Some(error) = query.error.as_deref() {
        return Err(AuthError::Invalid(format!("sign-in was not completed: {}", error)));
    }
    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AuthError::Invalid("missing authorization code".to_string()))?;
    let external = provider.exchange(code).await?;
    reconcile(backend, &external, session).await
}

pub async fn logout(req: HttpRequest, sessions: web::Data<Sessions>) -> HttpResponse {
    if let Some(user) = sessions.read(&req).user() {
        log::info!("user {} logged out", user);
    }
    HttpResponse::Ok()
        .cookie(sessions.clear())
        .json(Envelope::<()>::done("logged out"))
}

pub async fn me<B: Backend + 'static>(
    auth: Auth,
    backend: web::Data<B>,
) -> Result<HttpResponse, AuthError> {
    let member = accounts::profile(&**backend, auth.user())
        .await
        .map_err(|e| match e {
            AuthError::NotFound(_) => AuthError::Unauthenticated,
            e => e,
        })?;
    Ok(HttpResponse::Ok().json(Envelope::success(UserInfo::from(&member), "current user")))
}

pub async fn linked_accounts<B: Backend + 'static>(
    auth: Auth,
    backend: web::Data<B>,
) -> Result<HttpResponse, AuthError> {
    let accounts = accounts::linked(&**backend, auth.user())
        .await?
        .iter()
        .map(LinkedAccount::from)
        .collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(Envelope::success(accounts, "linked accounts")))
}

pub async fn unlink_account<B: Backend + 'static>(
    auth: Auth,
    path: web::Path<String>,
    backend: web::Data<B>,
) -> Result<HttpResponse, AuthError> {
    accounts::unlink(&**backend, auth.user(), &path).await?;
    Ok(HttpResponse::Ok().json(Envelope::<()>::done(format!("{} account unlinked", path.as_str()))))
}

/// Applies a profile patch and refreshes the session label.
pub async fn update_profile<B: Backend + 'static>(
    auth: Auth,
    req: HttpRequest,
    body: web::Json<Patch>,
    backend: web::Data<B>,
    sessions: web::Data<Sessions>,
) -> Result<HttpResponse, AuthError> {
    let patch = body.into_inner();
    let message = match patch.is_empty() {
        true => "No profile information was updated",
        false => "Profile updated",
    };
    let member = accounts::amend(&**backend, auth.user(), patch).await?;
    let mut session = sessions.read(&req);
    session.authenticate(&member);
    Ok(HttpResponse::Ok()
        .cookie(sessions.write(&session)?)
        .json(Envelope::success(UserInfo::from(&member), message)))
}

pub async fn update_theme<B: Backend + 'static>(
    auth: Auth,
    body: web::Json<ThemeRequest>,
    backend: web::Data<B>,
) -> Result<HttpResponse, AuthError> {
    let patch = Patch::theme(&body.ui_theme, &body.color_theme).map_err(AuthError::store("theme"))?;
    let member = accounts::amend(&**backend, auth.user(), patch).await?;
    Ok(HttpResponse::Ok().json(Envelope::success(UserInfo::from(&member), "theme updated")))
}
