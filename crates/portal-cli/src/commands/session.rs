use anyhow::{Result, bail};
use serde_json::{Map, Value, json};

use portal_session::{PortalField, SessionManager, marker_key};

use crate::cli::OutputFormat;
use crate::output::{print_rows, print_success, print_value, print_warning};

pub async fn inspect(sessions: &SessionManager, key: &str, format: OutputFormat) -> Result<()> {
    let portal = sessions.existing_portal(key).await?;
    let data = portal.data().await;
    let store = sessions.store();

    let mut fields = Map::new();
    let mut markers = Map::new();
    for (name, value) in &data {
        let field = PortalField::parse(name);
        fields.insert(name.clone(), Value::String(display_value(&field, value)));
        if let Some(suffix) = field.marker_suffix() {
            let marker = marker_key(key, &suffix);
            let current = store.get(&marker).await;
            markers.insert(marker, current.map_or(Value::Null, Value::String));
        }
    }

    let ttl = store.ttl(key).await;
    print_value(
        &json!({
            "key": key,
            "ttl": ttl,
            "fields": fields,
            "markers": markers,
        }),
        format,
    );
    Ok(())
}

/// Secrets are never printed in full.
fn display_value(field: &PortalField, value: &str) -> String {
    match field {
        PortalField::Password(_) => "<encrypted>".to_string(),
        PortalField::Oauth2Token(_) | PortalField::Otp | PortalField::Captcha(_) => {
            let shown: String = value.chars().take(4).collect();
            format!("{shown}…")
        }
        _ => value.to_string(),
    }
}

pub async fn backends(sessions: &SessionManager, key: &str, format: OutputFormat) -> Result<()> {
    let portal = sessions.existing_portal(key).await?;

    let found = portal.auth_backends().await;
    let mut rows = Vec::with_capacity(found.backends.len());
    for (app_id, backend_id) in &found.backends {
        let login = portal.login(backend_id).await.unwrap_or_default();
        let authenticated = portal.authenticated_backend(backend_id).await;
        rows.push(vec![
            app_id.clone(),
            backend_id.clone(),
            login,
            yes_no(authenticated),
        ]);
    }
    print_rows(&["App", "Backend", "Login", "Authenticated"], &rows, format);

    if !found.complete {
        print_warning(&format!(
            "Listing stopped after {} scan pages; more backends may exist",
            sessions.settings().max_scan_pages
        ));
    }
    Ok(())
}

pub async fn app_status(
    sessions: &SessionManager,
    key: &str,
    app_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let portal = sessions.existing_portal(key).await?;

    let flag = portal.field(&PortalField::app(app_id)).map(str::to_string);
    let marker = sessions.store().get(&marker_key(key, app_id)).await;
    let backend = portal.auth_backend(app_id).await;
    let authorized = portal.authenticated_app(app_id).await;

    print_value(
        &json!({
            "app_id": app_id,
            "flag": flag,
            "marker": marker,
            "backend": backend,
            "authorized": authorized,
        }),
        format,
    );

    if let (Some(flag), Some(marker)) = (&flag, &marker) {
        if flag != marker {
            print_warning(&format!(
                "Flag {flag:?} and marker {marker:?} of app {app_id} disagree"
            ));
        }
    }
    Ok(())
}

pub async fn destroy(sessions: &SessionManager, key: &str, app: bool) -> Result<()> {
    if app {
        let session = sessions.app(key).await?;
        if !session.destroy().await {
            bail!("Application session {key} could not be deleted");
        }
        print_success(&format!("Destroyed application session {key}"));
        return Ok(());
    }

    let mut portal = sessions.existing_portal(key).await?;
    if !portal.destroy().await {
        bail!("Portal session {key} could not be fully destroyed");
    }
    print_success(&format!("Destroyed portal session {key} and its marker keys"));
    Ok(())
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked() {
        assert_eq!(
            display_value(&PortalField::Password("7".into()), "opaque-token"),
            "<encrypted>"
        );
        assert_eq!(
            display_value(&PortalField::oauth2_token("7"), "abcdefgh"),
            "abcd…"
        );
        assert_eq!(display_value(&PortalField::login("7"), "alice"), "alice");
    }
}
