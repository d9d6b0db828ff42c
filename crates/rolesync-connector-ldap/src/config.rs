//! LDAP Directory configuration
//!
//! Connection, TLS and schema settings for the directory a sync pass reads.

use serde::{Deserialize, Serialize};

use rolesync_connector::config::{ConnectionSettings, ConnectorConfig, TlsConfig, REDACTED};
use rolesync_connector::error::{DirectoryError, DirectoryResult};

/// Configuration for the LDAP directory.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// `use_tls` (LDAPS), `skip_tls_verify`, `ca_cert_path`.
    #[serde(flatten)]
    pub tls: TlsConfig,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Bind DN for authentication (e.g., "cn=sync,dc=example,dc=com").
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password. Usually injected via `LDAP_BIND_PASSWORD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Base DN (e.g., "dc=example,dc=com").
    pub base_dn: String,

    /// Subtree searched for mapped groups; defaults to `base_dn`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_search_base: Option<String>,

    /// Connection settings (timeouts).
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Directory schema.
    #[serde(default)]
    pub schema: LdapSchema,
}

/// Attribute and object class names used during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapSchema {
    /// Object class a mapped group must carry to be found by name.
    #[serde(default = "default_group_object_class")]
    pub group_object_class: String,

    /// Attribute holding a group's name.
    #[serde(default = "default_group_name_attribute")]
    pub group_name_attribute: String,

    /// Attribute listing a group's member DNs.
    #[serde(default = "default_member_attribute")]
    pub member_attribute: String,

    /// Attribute identifying an individual account.
    #[serde(default = "default_user_id_attribute")]
    pub user_id_attribute: String,

    /// Object classes that mark a member entry as a nested group.
    #[serde(default = "default_group_object_classes")]
    pub group_object_classes: Vec<String>,
}

fn default_ldap_port() -> u16 {
    389
}

fn default_group_object_class() -> String {
    "groupOfNames".to_string()
}

fn default_group_name_attribute() -> String {
    "cn".to_string()
}

fn default_member_attribute() -> String {
    "member".to_string()
}

fn default_user_id_attribute() -> String {
    "uid".to_string()
}

fn default_group_object_classes() -> Vec<String> {
    vec![
        "group".to_string(),
        "groupOfNames".to_string(),
        "groupOfUniqueNames".to_string(),
    ]
}

impl Default for LdapSchema {
    fn default() -> Self {
        Self {
            group_object_class: default_group_object_class(),
            group_name_attribute: default_group_name_attribute(),
            member_attribute: default_member_attribute(),
            user_id_attribute: default_user_id_attribute(),
            group_object_classes: default_group_object_classes(),
        }
    }
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("use_starttls", &self.use_starttls)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &self.bind_password.as_ref().map(|_| REDACTED))
            .field("base_dn", &self.base_dn)
            .field("group_search_base", &self.group_search_base)
            .field("connection", &self.connection)
            .field("schema", &self.schema)
            .finish()
    }
}

impl LdapConfig {
    /// Create a new LDAP config with required fields.
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            tls: TlsConfig::default(),
            use_starttls: false,
            bind_dn: bind_dn.into(),
            bind_password: None,
            base_dn: base_dn.into(),
            group_search_base: None,
            connection: ConnectionSettings::default(),
            schema: LdapSchema::default(),
        }
    }

    /// Set bind password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    /// Enable LDAPS with the given TLS options.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = TlsConfig {
            enabled: true,
            ..tls
        };
        self.port = 636;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.use_starttls = true;
        self
    }

    /// Set the group search base.
    pub fn with_group_search_base(mut self, base: impl Into<String>) -> Self {
        self.group_search_base = Some(base.into());
        self
    }

    /// DN under which mapped groups are searched.
    #[must_use]
    pub fn search_base(&self) -> &str {
        self.group_search_base
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.base_dn)
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.tls.enabled && !self.use_starttls {
            "ldaps"
        } else {
            "ldap"
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// True when the connection is encrypted (LDAPS or STARTTLS).
    #[must_use]
    pub fn tls_in_use(&self) -> bool {
        self.tls.enabled || self.use_starttls
    }

    fn invalid(message: impl Into<String>) -> DirectoryError {
        DirectoryError::invalid_configuration(message)
    }
}

impl ConnectorConfig for LdapConfig {
    type Error = DirectoryError;

    fn validate(&self) -> DirectoryResult<()> {
        if self.host.is_empty() {
            return Err(Self::invalid("ldap.host is required"));
        }
        if self.port == 0 {
            return Err(Self::invalid("ldap.port must be greater than 0"));
        }
        if self.base_dn.is_empty() {
            return Err(Self::invalid("ldap.base_dn is required"));
        }
        if self.bind_dn.is_empty() {
            return Err(Self::invalid(
                "ldap.bind_dn is required (set it in the file or LDAP_BIND_DN)",
            ));
        }
        if self.tls.enabled && self.use_starttls {
            return Err(Self::invalid("cannot use both use_tls and use_starttls"));
        }
        if self.use_starttls && self.tls.ca_cert_path.is_none() && !self.tls.skip_verify {
            return Err(Self::invalid(
                "STARTTLS is enabled, but no ca_cert_path was provided and skip_tls_verify is false",
            ));
        }
        self.tls.check().map_err(Self::invalid)?;
        self.connection
            .check()
            .map_err(|e| Self::invalid(format!("ldap.connection: {e}")))?;

        let schema = &self.schema;
        for (name, value) in [
            ("group_object_class", &schema.group_object_class),
            ("group_name_attribute", &schema.group_name_attribute),
            ("member_attribute", &schema.member_attribute),
            ("user_id_attribute", &schema.user_id_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(Self::invalid(format!("ldap.schema.{name} must not be empty")));
            }
        }
        if schema.group_object_classes.is_empty() {
            return Err(Self::invalid(
                "ldap.schema.group_object_classes must not be empty",
            ));
        }

        Ok(())
    }

    fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.bind_password.is_some() {
            config.bind_password = Some(REDACTED.to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LdapConfig {
        LdapConfig::new(
            "ldap.example.com",
            "dc=example,dc=com",
            "cn=sync,dc=example,dc=com",
        )
        .with_password("secret")
    }

    #[test]
    fn test_defaults_from_minimal_yaml_keys() {
        let json = r#"{
            "host": "ldap.example.com",
            "base_dn": "dc=example,dc=com",
            "bind_dn": "cn=sync,dc=example,dc=com",
            "group_search_base": "ou=groups,dc=example,dc=com",
            "use_tls": true,
            "ca_cert_path": "/etc/ssl/ldap-ca.pem"
        }"#;
        let config: LdapConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.port, 389);
        assert!(config.tls.enabled);
        assert!(!config.tls.skip_verify);
        assert_eq!(config.search_base(), "ou=groups,dc=example,dc=com");
        assert_eq!(config.schema, LdapSchema::default());
        assert_eq!(config.url(), "ldaps://ldap.example.com:389");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_search_base_falls_back_to_base_dn() {
        let mut config = base();
        assert_eq!(config.search_base(), "dc=example,dc=com");
        config.group_search_base = Some(String::new());
        assert_eq!(config.search_base(), "dc=example,dc=com");
    }

    #[test]
    fn test_url_schemes() {
        assert_eq!(base().url(), "ldap://ldap.example.com:389");
        assert_eq!(
            base().with_tls(TlsConfig::default().insecure()).url(),
            "ldaps://ldap.example.com:636"
        );
        let starttls = base().with_starttls();
        assert_eq!(starttls.url(), "ldap://ldap.example.com:389");
        assert!(starttls.tls_in_use());
    }

    #[test]
    fn test_validate_tls_requires_ca_or_skip() {
        let config = base().with_tls(TlsConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ca_cert_path"));

        assert!(base()
            .with_tls(TlsConfig::default().with_ca_cert("/ca.pem"))
            .validate()
            .is_ok());
        assert!(base().with_starttls().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_conflicts_and_blanks() {
        let mut config = base().with_tls(TlsConfig::default().insecure());
        config.use_starttls = true;
        assert!(config.validate().is_err());

        let mut config = base();
        config.bind_dn = String::new();
        assert_eq!(config.validate().unwrap_err().error_code(), "INVALID_CONFIG");

        let mut config = base();
        config.schema.user_id_attribute = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_and_debug_hide_password() {
        let config = base();
        assert_eq!(config.redacted().bind_password.as_deref(), Some(REDACTED));
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains(REDACTED));
    }
}
