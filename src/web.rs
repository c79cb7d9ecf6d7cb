use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{normalize_user, Config};
use crate::error::{AppError, Result};
use crate::history::HistoryLog;
use crate::model::{
    AccountEntry, AccountKind, DocumentStatus, Provision, ReviewForm, FINANCIAL_SYSTEMS,
};
use crate::session::{Session, SessionStore};
use crate::{pdf, report};

const SESSION_COOKIE: &str = "session";
const MSG_BAD_LOGIN: &str = "Usuário ou senha incorretos";
const MSG_EMPTY: &str = "Nenhum dado preenchido para gerar o PDF.";

pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub history: HistoryLog,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates.register_template_string("login", include_str!("../templates/login.hbs"))?;
        templates.register_template_string("form", include_str!("../templates/form.hbs"))?;
        let history = HistoryLog::new(
            config.secrets.spreadsheet_path.clone(),
            config.secrets.worksheet.clone(),
        );
        Ok(Self {
            config,
            sessions: SessionStore::new(),
            history,
            templates,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(form_page))
        .route("/form", post(form_apply))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// View models (templates stay logic-free; selection flags are precomputed)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct OptionView {
    value: String,
    label: String,
    selected: bool,
}

#[derive(Serialize)]
struct AccountView {
    /// Form field name prefix, e.g. `acct_0_1`.
    prefix: String,
    /// Action value of the remove button, e.g. `remove_0_1`.
    remove_action: String,
    kind_options: Vec<OptionView>,
    is_cash: bool,
    name: String,
    statement: String,
    balance: String,
    reconciliations: String,
    provision_options: Vec<OptionView>,
    document_options: Vec<OptionView>,
    observations: String,
}

#[derive(Serialize)]
struct SectorView {
    index: usize,
    name: String,
    responsible: String,
    accounts: Vec<AccountView>,
}

#[derive(Serialize)]
struct FormView {
    reviewer: String,
    review_date: String,
    period_start: String,
    period_end: String,
    system_options: Vec<OptionView>,
    available_sectors: Vec<OptionView>,
    sectors: Vec<SectorView>,
    no_sectors: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct LoginView {
    error: Option<String>,
}

fn account_view(sector_idx: usize, account_idx: usize, entry: &AccountEntry) -> AccountView {
    AccountView {
        prefix: format!("acct_{sector_idx}_{account_idx}"),
        remove_action: format!("remove_{sector_idx}_{account_idx}"),
        kind_options: AccountKind::ALL
            .iter()
            .map(|k| OptionView {
                value: k.label().to_string(),
                label: k.label().to_string(),
                selected: *k == entry.kind,
            })
            .collect(),
        is_cash: entry.kind.is_cash(),
        name: entry.name.clone(),
        statement: entry.statement.clone(),
        balance: entry.balance.clone(),
        reconciliations: entry.reconciliations.clone(),
        provision_options: Provision::ALL
            .iter()
            .map(|p| OptionView {
                value: p.label().to_string(),
                label: p.label().to_string(),
                selected: *p == entry.provision,
            })
            .collect(),
        document_options: DocumentStatus::ALL
            .iter()
            .map(|d| OptionView {
                value: d.label().to_string(),
                label: d.label().to_string(),
                selected: *d == entry.documents,
            })
            .collect(),
        observations: entry.observations.clone(),
    }
}

fn form_view(state: &AppState, session: &Session, error: Option<String>) -> FormView {
    let draft = &session.draft;
    let available = state.config.sectors_for(&session.user);
    FormView {
        reviewer: report::reviewer_display_name(&session.user),
        review_date: draft.review_date.format("%Y-%m-%d").to_string(),
        period_start: draft.period_start.format("%Y-%m-%d").to_string(),
        period_end: draft.period_end.format("%Y-%m-%d").to_string(),
        system_options: FINANCIAL_SYSTEMS
            .iter()
            .map(|s| OptionView {
                value: s.to_string(),
                label: s.to_string(),
                selected: *s == draft.system,
            })
            .collect(),
        available_sectors: available
            .iter()
            .map(|name| OptionView {
                value: name.clone(),
                label: name.clone(),
                selected: draft.sectors.iter().any(|s| &s.name == name),
            })
            .collect(),
        sectors: draft
            .sectors
            .iter()
            .enumerate()
            .map(|(s, sector)| SectorView {
                index: s,
                name: sector.name.clone(),
                responsible: sector.responsible.clone(),
                accounts: sector
                    .accounts
                    .iter()
                    .enumerate()
                    .map(|(a, entry)| account_view(s, a, entry))
                    .collect(),
            })
            .collect(),
        no_sectors: available.is_empty(),
        error,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn current_session(state: &AppState, jar: &CookieJar) -> Result<(String, Session)> {
    let id = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::Unauthorized)?;
    let session = state.sessions.get(&id).ok_or(AppError::Unauthorized)?;
    Ok((id, session))
}

#[derive(Deserialize)]
struct LoginForm {
    usuario: String,
    senha: String,
}

async fn login_page(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let body = state
        .templates
        .render("login", &LoginView { error: None })?;
    Ok(Html(body))
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(login): Form<LoginForm>,
) -> Result<Response> {
    let user = normalize_user(&login.usuario);
    if !state.config.verify_login(&user, &login.senha) {
        info!(user = %user, "rejected login");
        let body = state.templates.render(
            "login",
            &LoginView {
                error: Some(MSG_BAD_LOGIN.to_string()),
            },
        )?;
        return Ok(Html(body).into_response());
    }

    let id = state.sessions.create(&user);
    info!(user = %user, "login ok");
    let cookie = Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .build();
    Ok((jar.add(cookie), Redirect::to("/")).into_response())
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    (jar, Redirect::to("/login")).into_response()
}

async fn form_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Html<String>> {
    let (_, session) = current_session(&state, &jar)?;
    let body = state
        .templates
        .render("form", &form_view(&state, &session, None))?;
    Ok(Html(body))
}

/// Single mutation endpoint: the whole form posts here with every field plus
/// an `action` value. Field values are folded back into the session draft
/// first, then the action runs against the updated draft.
async fn form_apply(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response> {
    let (id, mut session) = current_session(&state, &jar)?;

    apply_fields(&mut session.draft, &pairs);
    let action = pairs
        .iter()
        .rev()
        .find(|(k, _)| k == "action")
        .map(|(_, v)| v.as_str())
        .unwrap_or("refresh");

    match parse_action(action) {
        Action::Refresh => {}
        Action::AddAccount(s) => {
            if let Some(sector) = session.draft.sectors.get_mut(s) {
                sector.accounts.push(AccountEntry::default());
            }
        }
        Action::RemoveAccount(s, a) => {
            if let Some(sector) = session.draft.sectors.get_mut(s) {
                if a < sector.accounts.len() {
                    sector.accounts.remove(a);
                }
            }
        }
        Action::Generate { save } => {
            state.sessions.set_draft(&id, session.draft.clone());
            return generate(&state, &session, save).await;
        }
    }

    state.sessions.set_draft(&id, session.draft);
    Ok(Redirect::to("/").into_response())
}

async fn generate(state: &AppState, session: &Session, save: bool) -> Result<Response> {
    let export = report::build_export(&session.draft, &session.user);
    if export.blocks.is_empty() {
        let body = state
            .templates
            .render("form", &form_view(state, session, Some(MSG_EMPTY.to_string())))?;
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(body)).into_response());
    }

    if save {
        state.history.append(&export.rows)?;
        info!(
            rows = export.rows.len(),
            history = %state.history.path().display(),
            "history rows appended"
        );
    }

    let reviewer = report::reviewer_display_name(&session.user);
    let bytes = pdf::render_report(&export.blocks, &reviewer)?;
    let filename = report::download_filename(&session.draft);
    info!(user = %session.user, blocks = export.blocks.len(), saved = save, "report generated");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

enum Action {
    Refresh,
    AddAccount(usize),
    RemoveAccount(usize, usize),
    Generate { save: bool },
}

fn parse_action(raw: &str) -> Action {
    if raw == "generate_save" {
        return Action::Generate { save: true };
    }
    if raw == "generate_only" {
        return Action::Generate { save: false };
    }
    if let Some(rest) = raw.strip_prefix("add_") {
        if let Ok(s) = rest.parse() {
            return Action::AddAccount(s);
        }
    }
    if let Some(rest) = raw.strip_prefix("remove_") {
        if let Some((s, a)) = rest.split_once('_') {
            if let (Ok(s), Ok(a)) = (s.parse(), a.parse()) {
                return Action::RemoveAccount(s, a);
            }
        }
    }
    Action::Refresh
}

/// Fold the flat field list back into the draft. Indices refer to the draft
/// as it was rendered, so fields are applied before the sector selection is
/// reconciled by name.
fn apply_fields(draft: &mut ReviewForm, pairs: &[(String, String)]) {
    for (key, value) in pairs {
        match key.as_str() {
            "review_date" => {
                if let Ok(d) = value.parse() {
                    draft.review_date = d;
                }
            }
            "period_start" => {
                if let Ok(d) = value.parse() {
                    draft.period_start = d;
                }
            }
            "period_end" => {
                if let Ok(d) = value.parse() {
                    draft.period_end = d;
                }
            }
            "system" => {
                if FINANCIAL_SYSTEMS.contains(&value.as_str()) {
                    draft.system = value.clone();
                }
            }
            _ => apply_indexed_field(draft, key, value),
        }
    }

    let selected: Vec<String> = pairs
        .iter()
        .filter(|(k, _)| k == "sectors")
        .map(|(_, v)| v.clone())
        .collect();
    draft.select_sectors(&selected);
}

fn apply_indexed_field(draft: &mut ReviewForm, key: &str, value: &str) {
    if let Some(rest) = key.strip_prefix("sector_") {
        if let Some((idx, field)) = rest.split_once('_') {
            if field == "resp" {
                if let Ok(s) = idx.parse::<usize>() {
                    if let Some(sector) = draft.sectors.get_mut(s) {
                        sector.responsible = value.to_string();
                    }
                }
            }
        }
        return;
    }

    let Some(rest) = key.strip_prefix("acct_") else {
        return;
    };
    let mut parts = rest.splitn(3, '_');
    let (Some(s), Some(a), Some(field)) = (parts.next(), parts.next(), parts.next()) else {
        return;
    };
    let (Ok(s), Ok(a)) = (s.parse::<usize>(), a.parse::<usize>()) else {
        return;
    };
    let Some(entry) = draft
        .sectors
        .get_mut(s)
        .and_then(|sector| sector.accounts.get_mut(a))
    else {
        return;
    };

    match field {
        "kind" => {
            if let Some(kind) = AccountKind::from_label(value) {
                entry.kind = kind;
            }
        }
        "name" => entry.name = value.to_string(),
        "statement" => entry.statement = value.to_string(),
        "balance" => entry.balance = value.to_string(),
        "recs" => entry.reconciliations = value.to_string(),
        "prov" => {
            if let Some(p) = Provision::from_label(value) {
                entry.provision = p;
            }
        }
        "docs" => {
            if let Some(d) = DocumentStatus::from_label(value) {
                entry.documents = d;
            }
        }
        "obs" => entry.observations = value.to_string(),
        _ => {}
    }
}
