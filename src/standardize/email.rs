//! Email address standardization.

const GMAIL_DOMAINS: [&str; 2] = ["gmail.com", "googlemail.com"];

/// Lowercases and trims an email address.
///
/// Gmail addresses lose dots and any `+tag` in the local part, and
/// `googlemail.com` becomes `gmail.com`.
///
/// ```
/// use entity_resolution::standardize::standardize_email;
///
/// assert_eq!(standardize_email(" J.Doe+news@GoogleMail.com "), "jdoe@gmail.com");
/// assert_eq!(standardize_email("J.Doe@Example.org"), "j.doe@example.org");
/// ```
#[must_use]
pub fn standardize_email(raw: &str) -> String {
    let email = raw.trim().to_lowercase();

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return email;
    };

    if !GMAIL_DOMAINS.contains(&domain) {
        return email;
    }

    let local: String = local.split('+').next().unwrap_or_default().replace('.', "");
    format!("{local}@gmail.com")
}

/// Splits a standardized email into `(local, domain)`.
pub(crate) fn split_email(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.split_once('@')?;
    (!domain.contains('@')).then_some((local, domain))
}
