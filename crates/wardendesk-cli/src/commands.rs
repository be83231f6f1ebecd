//! Subcommand handlers.
//!
//! Each invocation builds one `ComplaintCache` for the warden's hostel and
//! hands it to whatever needs it, the way the dashboard's views share one.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use wardendesk_core::auth::{CredentialStore, Session, SessionData};
use wardendesk_core::models::{ComplaintFilter, ComplaintId, ComplaintStatus, WardenProfileUpdate};
use wardendesk_core::{ApiClient, ApiError, ComplaintCache, Config, StatusReviewer};

use crate::render;

/// Everything a signed-in command needs.
struct Workspace {
    config: Config,
    session: Session,
    client: ApiClient,
    cache: ComplaintCache,
}

impl Workspace {
    fn open() -> Result<Self> {
        let config = Config::load()?;
        let mut session = Session::new(config.cache_dir()?);
        session.load()?;

        let client = ApiClient::with_timeout(config.endpoints(), config.request_timeout())
            .context("Failed to create HTTP client")?;
        let cache = ComplaintCache::new(Arc::new(client.clone()), config.cache_config());

        Ok(Self {
            config,
            session,
            client,
            cache,
        })
    }

    fn warden_id(&self) -> Result<String> {
        self.session
            .warden_id()
            .map(str::to_string)
            .or_else(|| self.config.warden_id.clone())
            .context("Not signed in. Run `wardendesk login --warden-id <ID>` first.")
    }

    /// Client carrying the stored bearer token.
    fn authed_client(&self) -> Result<ApiClient> {
        let warden_id = self.warden_id()?;
        let token = CredentialStore::for_warden(&warden_id)?
            .get_token()?
            .context("No token stored. Run `wardendesk login` again.")?;
        Ok(self.client.with_token(token))
    }

    /// Hostel to show: explicit override first, then the session, then the
    /// warden profile.
    async fn hostel(&mut self) -> Result<String> {
        if let Some(hostel) = self.config.hostel.clone() {
            return Ok(hostel);
        }
        if let Some(hostel) = self.session.hostel() {
            return Ok(hostel.to_string());
        }

        debug!("Hostel not in session, fetching warden profile");
        let warden_id = self.warden_id()?;
        let warden = self
            .authed_client()?
            .fetch_warden(&warden_id)
            .await
            .map_err(with_login_hint)?;
        let hostel = warden
            .hostel
            .context("Warden profile has no hostel. Pass --hostel at login.")?;

        if let Some(mut data) = self.session.data.clone() {
            data.hostel = Some(hostel.clone());
            self.session.update(data);
            self.session.save()?;
        }
        Ok(hostel)
    }
}

/// Point the user at `login` when the stored token was refused.
fn with_login_hint(e: ApiError) -> anyhow::Error {
    if e.is_auth() {
        anyhow::Error::new(e).context("Token rejected. Run `wardendesk login` again.")
    } else {
        e.into()
    }
}

pub async fn login(warden_id: String, token: Option<String>, hostel: Option<String>) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => rpassword::prompt_password("Token: ").context("Failed to read token")?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("Token must not be empty");
    }

    let config = Config::load()?;
    let client = ApiClient::with_timeout(config.endpoints(), config.request_timeout())?
        .with_token(token.clone());

    // Verifies the token as well as fetching the hostel
    let warden = client
        .fetch_warden(&warden_id)
        .await
        .context("Sign-in failed")?;

    let mut data = SessionData::new(warden_id.clone());
    data.hostel = hostel.or_else(|| warden.hostel.clone());
    data.username = warden.name.clone();

    CredentialStore::for_warden(&warden_id)?.store_token(&token)?;
    let mut session = Session::new(config.cache_dir()?);
    session.update(data);
    session.save()?;

    info!(warden_id = %warden_id, "Signed in");
    println!("Signed in as {}", warden.display_name());
    match session.hostel() {
        Some(hostel) => println!("Hostel: {}", hostel),
        None => println!("No hostel on profile; set WARDENDESK_HOSTEL or log in with --hostel."),
    }
    Ok(())
}

pub fn logout() -> Result<()> {
    let config = Config::load()?;
    let mut session = Session::new(config.cache_dir()?);
    session.load()?;
    if let Some(warden_id) = session.warden_id() {
        CredentialStore::for_warden(warden_id)?.delete_token()?;
    }
    session.clear()?;
    info!("Signed out");
    println!("Signed out.");
    Ok(())
}

/// Show the profile, first saving any fields given in `update`.
pub async fn profile(update: WardenProfileUpdate) -> Result<()> {
    let mut ws = Workspace::open()?;
    let warden_id = ws.warden_id()?;
    let client = ws.authed_client()?;
    let mut warden = client
        .fetch_warden(&warden_id)
        .await
        .map_err(with_login_hint)?;

    if !update.is_empty() {
        client
            .update_warden_profile(&warden_id, &update)
            .await
            .map_err(with_login_hint)
            .context("Profile update failed")?;
        update.apply_to(&mut warden);
        info!(warden_id = %warden_id, "Profile updated");

        if let (Some(name), Some(mut data)) = (update.name.as_ref(), ws.session.data.clone()) {
            data.username = Some(name.clone());
            ws.session.update(data);
            ws.session.save()?;
        }
        println!("Profile updated.");
    }
    print!("{}", render::profile(&warden));
    Ok(())
}

pub async fn stats(refresh: bool) -> Result<()> {
    let mut ws = Workspace::open()?;
    let hostel = ws.hostel().await?;

    if refresh {
        ws.cache.load_stats(&hostel, true).await?;
    } else {
        ws.cache.initialize(&hostel).await?;
    }
    print!("{}", render::stats(&ws.cache.snapshot()));
    Ok(())
}

pub async fn list(page: u32, filter: ComplaintFilter, refresh: bool) -> Result<()> {
    let mut ws = Workspace::open()?;
    let hostel = ws.hostel().await?;

    if refresh {
        ws.cache.refresh(&hostel, page).await?;
    } else {
        ws.cache.load_complaints(&hostel, false, page).await?;
    }

    let snapshot = ws.cache.snapshot();
    let shown = ws.cache.filtered(&filter);
    print!("{}", render::complaint_list(&snapshot, &shown, &filter));
    Ok(())
}

pub async fn show(id: ComplaintId, page: u32) -> Result<()> {
    let mut ws = Workspace::open()?;
    let hostel = ws.hostel().await?;
    ws.cache.load_page(&hostel, page).await?;

    let record = match ws.cache.get_by_id(id) {
        Some(record) => record,
        None => {
            debug!(id = %id, page, "Complaint not on page, fetching it");
            ws.client.fetch_complaint(id).await?
        }
    };
    print!("{}", render::complaint_detail(&record));
    Ok(())
}

pub async fn review(id: ComplaintId, page: u32, to: ComplaintStatus) -> Result<()> {
    let mut ws = Workspace::open()?;
    let hostel = ws.hostel().await?;
    let warden_id = ws.warden_id()?;

    // Stats too, so the confirmed change is reflected in the counts
    ws.cache.load_complaints(&hostel, false, page).await?;

    let reviewer = StatusReviewer::new(Arc::new(ws.client.clone()), ws.cache.clone(), warden_id);
    let outcome = reviewer.transition(id, to).await?;

    if !outcome.applied_locally {
        warn!(id = %id, "Complaint was not on the loaded page");
    }
    print!("{}", render::review_outcome(&outcome, ws.cache.stats().as_ref()));
    Ok(())
}
