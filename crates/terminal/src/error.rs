//! Error reporting with Sentry integration.
//!
//! Failures on the till become a notice on the page the cashier is looking
//! at, and each layer's `thiserror` enum carries the message. What reaches
//! Sentry is the tracing events (`warn!` and `error!`) plus the user context
//! and breadcrumbs set here.

/// Set the Sentry user context.
///
/// Called whenever the session holder observes a new session.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a cashier action.
///
/// Breadcrumbs show the trail of actions leading up to an error report.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    sentry::add_breadcrumb(breadcrumb(category, message, data.unwrap_or_default()));
}

fn breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) -> sentry::Breadcrumb {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    breadcrumb
}
