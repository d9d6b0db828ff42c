//! LDAP Directory implementation
//!
//! Implements the Directory trait over an `ldap3` connection.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, SearchResult};
use native_tls::{Certificate, TlsConnector};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use rolesync_connector::config::ConnectorConfig;
use rolesync_connector::error::{DirectoryError, DirectoryResult};
use rolesync_connector::ids::EntryRef;
use rolesync_connector::traits::{Directory, DirectoryEntry};

use crate::config::{LdapConfig, LdapSchema};

/// `noSuchObject`
const RC_NO_SUCH_OBJECT: u32 = 32;
/// `invalidDNSyntax`
const RC_INVALID_DN_SYNTAX: u32 = 34;
/// `invalidCredentials`
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Read-only LDAP directory used for group resolution.
pub struct LdapDirectory {
    /// Configuration.
    config: LdapConfig,

    /// Cached LDAP connection (lazily initialized).
    connection: Arc<RwLock<Option<Ldap>>>,

    /// Whether the directory has been closed.
    closed: Arc<RwLock<bool>>,
}

impl LdapDirectory {
    /// Create a new LDAP directory with the given configuration.
    pub fn new(config: LdapConfig) -> DirectoryResult<Self> {
        config.validate()?;
        config.tls.validate_security();

        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            closed: Arc::new(RwLock::new(false)),
        })
    }

    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Connect and bind now instead of on first use.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn connect(&self) -> DirectoryResult<()> {
        self.get_connection().await.map(|_| ())
    }

    /// Get an LDAP connection, creating one if necessary.
    async fn get_connection(&self) -> DirectoryResult<Ldap> {
        if *self.closed.read().await {
            return Err(DirectoryError::Closed);
        }

        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let conn = self.create_connection().await?;

        {
            let mut conn_guard = self.connection.write().await;
            *conn_guard = Some(conn.clone());
        }

        Ok(conn)
    }

    /// TLS connector trusting the configured CA, if one is set.
    fn tls_connector(&self) -> DirectoryResult<Option<TlsConnector>> {
        let Some(path) = self.config.tls.ca_cert_path.as_deref() else {
            return Ok(None);
        };
        if !self.config.tls_in_use() {
            return Ok(None);
        }

        info!(path = %path, "Loading custom CA certificate");
        let pem = std::fs::read(path).map_err(|e| {
            DirectoryError::invalid_configuration(format!(
                "could not read CA certificate from '{path}': {e}"
            ))
        })?;
        let certificate = Certificate::from_pem(&pem).map_err(|e| {
            DirectoryError::invalid_configuration(format!(
                "invalid CA certificate in '{path}': {e}"
            ))
        })?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| {
                DirectoryError::connection_failed_with_source("failed to build TLS connector", e)
            })?;
        Ok(Some(connector))
    }

    /// Create a new LDAP connection.
    async fn create_connection(&self) -> DirectoryResult<Ldap> {
        let url = self.config.url();
        debug!(url = %url, "Connecting to LDAP server");

        let skip_verify = self.config.tls.skip_verify && self.config.tls.ca_cert_path.is_none();
        if self.config.tls_in_use() && skip_verify {
            warn!("No CA certificate provided, TLS certificate verification is disabled");
        }

        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection.connection_timeout())
            .set_starttls(self.config.use_starttls)
            .set_no_tls_verify(skip_verify);
        if let Some(connector) = self.tls_connector()? {
            settings = settings.set_connector(connector);
        }

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {url}"),
                    e,
                )
            })?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = ldap
            .with_timeout(self.config.connection.operation_timeout())
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("LDAP bind failed for {bind_dn}"),
                    e,
                )
            })?;

        if result.rc != 0 {
            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(DirectoryError::AuthenticationFailed);
            }
            return Err(DirectoryError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(host = %self.config.host, "LDAP connection established successfully");

        Ok(ldap)
    }

    /// Map a client error, dropping the cached connection unless the error
    /// was a plain timeout.
    async fn operation_error(&self, context: String, error: LdapError) -> DirectoryError {
        if let LdapError::Timeout { .. } = error {
            return DirectoryError::Timeout {
                timeout_secs: self.config.connection.operation_timeout_secs,
            };
        }
        self.connection.write().await.take();
        DirectoryError::search_failed_with_source(context, error)
    }

    /// Unbind and refuse further use.
    pub async fn close(&self) {
        *self.closed.write().await = true;

        let mut conn_guard = self.connection.write().await;
        if let Some(mut ldap) = conn_guard.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "Error during LDAP unbind");
            }
        }

        info!("LDAP connection closed");
    }
}

/// Filter matching a group of the configured class by exact name.
pub(crate) fn group_filter(schema: &LdapSchema, name: &str) -> String {
    format!(
        "(&(objectClass={})({}={}))",
        schema.group_object_class,
        schema.group_name_attribute,
        ldap3::ldap_escape(name)
    )
}

/// Attribute values by case-insensitive attribute name.
fn attr_values<'a>(entry: &'a SearchEntry, name: &str) -> &'a [String] {
    entry
        .attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, values)| values.as_slice())
        .unwrap_or(&[])
}

/// Project a search entry onto the attributes resolution needs.
pub(crate) fn to_directory_entry(
    reference: EntryRef,
    entry: &SearchEntry,
    schema: &LdapSchema,
) -> DirectoryEntry {
    let mut out = DirectoryEntry::new(reference);
    out.object_classes = attr_values(entry, "objectClass").to_vec();
    out.member_refs = attr_values(entry, &schema.member_attribute)
        .iter()
        .map(|dn| EntryRef::new(dn.as_str()))
        .collect();
    out.identifier = attr_values(entry, &schema.user_id_attribute)
        .iter()
        .find(|v| !v.is_empty())
        .cloned();
    out
}

#[async_trait]
impl Directory for LdapDirectory {
    #[instrument(skip(self))]
    async fn find_group(&self, name: &str) -> DirectoryResult<EntryRef> {
        let mut ldap = self.get_connection().await?;
        let base = self.config.search_base();
        let filter = group_filter(&self.config.schema, name);

        debug!(filter = %filter, base_dn = %base, "Searching for group");

        let search = ldap
            .with_timeout(self.config.connection.operation_timeout())
            .search(base, Scope::Subtree, &filter, vec!["1.1"])
            .await;
        let SearchResult(entries, result) = match search {
            Ok(found) => found,
            Err(e) => {
                return Err(self
                    .operation_error(format!("group search for '{name}' failed"), e)
                    .await)
            }
        };

        if result.rc != 0 {
            return Err(DirectoryError::search_failed(format!(
                "group search for '{name}' under '{base}' returned code {}: {}",
                result.rc, result.text
            )));
        }

        let dns: Vec<String> = entries
            .into_iter()
            .filter(|e| !e.is_ref() && !e.is_intermediate())
            .map(|e| SearchEntry::construct(e).dn)
            .collect();
        let count = dns.len();

        match (dns.into_iter().next(), count) {
            (None, _) => Err(DirectoryError::GroupNotFound {
                name: name.to_string(),
                search_base: base.to_string(),
            }),
            (Some(dn), 1) => {
                debug!(group_dn = %dn, "Found group");
                Ok(EntryRef::from(dn))
            }
            (Some(_), count) => Err(DirectoryError::AmbiguousGroup {
                name: name.to_string(),
                count,
            }),
        }
    }

    async fn entry(&self, reference: &EntryRef) -> DirectoryResult<Option<DirectoryEntry>> {
        let mut ldap = self.get_connection().await?;
        let schema = &self.config.schema;
        let attrs = vec![
            "objectClass",
            schema.member_attribute.as_str(),
            schema.user_id_attribute.as_str(),
        ];

        let search = ldap
            .with_timeout(self.config.connection.operation_timeout())
            .search(reference.as_str(), Scope::Base, "(objectClass=*)", attrs)
            .await;
        let SearchResult(entries, result) = match search {
            Ok(found) => found,
            Err(e) => {
                return Err(self
                    .operation_error(format!("read of '{reference}' failed"), e)
                    .await)
            }
        };

        match result.rc {
            0 => {}
            RC_NO_SUCH_OBJECT | RC_INVALID_DN_SYNTAX => return Ok(None),
            rc => {
                return Err(DirectoryError::search_failed(format!(
                    "read of '{reference}' returned code {rc}: {}",
                    result.text
                )))
            }
        }

        Ok(entries
            .into_iter()
            .find(|e| !e.is_ref() && !e.is_intermediate())
            .map(|e| to_directory_entry(reference.clone(), &SearchEntry::construct(e), schema)))
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("config", &self.config.redacted())
            .finish()
    }
}
