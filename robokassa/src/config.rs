//! Shop credentials consumed by the signing core.
//!
//! RoboKassa issues three secrets per shop:
//!
//! - **password1** signs outgoing requests (payment links, admin XML calls)
//!   and SuccessURL redirects
//! - **password2** authenticates ResultURL notifications
//! - **password3** signs refund service tokens; optional, required only for
//!   the JWT refund API

use std::fmt;

use crate::algorithm::SignatureAlgorithm;
use crate::error::RoboKassaError;

/// Merchant credentials and signing defaults.
///
/// Secrets are never printed by the [`Debug`] implementation.
///
/// # Example
///
/// ```rust
/// use robokassa::config::Credentials;
/// use robokassa::SignatureAlgorithm;
///
/// let creds = Credentials::new("demo", "pass1", "pass2")
///     .unwrap()
///     .with_password3("pass3")
///     .with_algorithm(SignatureAlgorithm::Sha256)
///     .with_test_mode(true);
/// assert_eq!(creds.merchant_login(), "demo");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    merchant_login: String,
    password1: String,
    password2: String,
    password3: Option<String>,
    algorithm: SignatureAlgorithm,
    test_mode: bool,
}

impl Credentials {
    /// Creates credentials with the default algorithm (MD5) and test mode off.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Configuration`] if any value is empty.
    pub fn new(
        merchant_login: impl Into<String>,
        password1: impl Into<String>,
        password2: impl Into<String>,
    ) -> Result<Self, RoboKassaError> {
        let merchant_login = merchant_login.into();
        let password1 = password1.into();
        let password2 = password2.into();
        if merchant_login.trim().is_empty() {
            return Err(RoboKassaError::configuration("merchant_login is required"));
        }
        if password1.is_empty() {
            return Err(RoboKassaError::configuration("password1 is required"));
        }
        if password2.is_empty() {
            return Err(RoboKassaError::configuration("password2 is required"));
        }
        Ok(Self {
            merchant_login,
            password1,
            password2,
            password3: None,
            algorithm: SignatureAlgorithm::default(),
            test_mode: false,
        })
    }

    /// Sets the refund service secret. An empty value leaves it unset.
    #[must_use]
    pub fn with_password3(mut self, password3: impl Into<String>) -> Self {
        let password3 = password3.into();
        self.password3 = (!password3.is_empty()).then_some(password3);
        self
    }

    /// Sets the default signature algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Enables or disables test mode for payment links.
    #[must_use]
    pub const fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Returns the merchant login.
    #[must_use]
    pub fn merchant_login(&self) -> &str {
        &self.merchant_login
    }

    /// Returns the outbound signing secret.
    #[must_use]
    pub fn password1(&self) -> &str {
        &self.password1
    }

    /// Returns the inbound verification secret.
    #[must_use]
    pub fn password2(&self) -> &str {
        &self.password2
    }

    /// Returns the refund service secret, if configured.
    #[must_use]
    pub fn password3(&self) -> Option<&str> {
        self.password3.as_deref()
    }

    /// Returns the refund service secret or a configuration error naming
    /// `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Configuration`] if password3 is not set.
    pub fn require_password3(&self, operation: &str) -> Result<&str, RoboKassaError> {
        self.password3().ok_or_else(|| {
            RoboKassaError::configuration(format!("password3 is required for {operation}"))
        })
    }

    /// Returns the default signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Returns whether test mode is enabled.
    #[must_use]
    pub const fn test_mode(&self) -> bool {
        self.test_mode
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("merchant_login", &self.merchant_login)
            .field("has_password3", &self.password3.is_some())
            .field("algorithm", &self.algorithm)
            .field("test_mode", &self.test_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_values() {
        assert!(Credentials::new("", "p1", "p2").is_err());
        assert!(Credentials::new("demo", "", "p2").is_err());
        assert!(Credentials::new("demo", "p1", "").is_err());
    }

    #[test]
    fn test_require_password3() {
        let creds = Credentials::new("demo", "p1", "p2").unwrap();
        let err = creds.require_password3("refund API").unwrap_err();
        assert!(matches!(err, RoboKassaError::Configuration(_)));
        assert!(err.to_string().contains("password3 is required"));

        let creds = creds.with_password3("p3");
        assert_eq!(creds.require_password3("refund API").unwrap(), "p3");
    }

    #[test]
    fn test_empty_password3_is_unset() {
        let creds = Credentials::new("demo", "p1", "p2")
            .unwrap()
            .with_password3("");
        assert!(creds.password3().is_none());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::new("demo", "secret-one", "secret-two")
            .unwrap()
            .with_password3("secret-three");
        let debug = format!("{creds:?}");
        assert!(debug.contains("demo"));
        assert!(!debug.contains("secret-one"));
        assert!(!debug.contains("secret-two"));
        assert!(!debug.contains("secret-three"));
    }
}
