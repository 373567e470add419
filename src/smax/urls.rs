use crate::config::ConnectionConfig;

/// Derives every endpoint of the remote system from a [`ConnectionConfig`].
#[derive(Debug, Clone, Copy)]
pub struct UrlBuilder<'a> {
    config: &'a ConnectionConfig,
}

/// `:port` unless the port is 80. Both the plain and the secure port go
/// through this check, so a secure port of 443 is always written out.
fn port_segment(port: u16) -> String {
    if port == 80 {
        String::new()
    } else {
        format!(":{port}")
    }
}

impl<'a> UrlBuilder<'a> {
    pub const fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn authorization_url(&self) -> String {
        format!(
            "{}://{}{}/auth/authentication-endpoint/authenticate/login?TENANTID={}",
            self.config.protocol,
            self.config.host,
            port_segment(self.config.secure_port),
            self.config.tenant
        )
    }

    pub fn base_rest_url(&self) -> String {
        format!(
            "{}://{}{}/rest/{}/ems",
            self.config.protocol,
            self.config.host,
            port_segment(self.config.port),
            self.config.tenant
        )
    }

    pub fn entity_url(&self, layout: &str) -> String {
        let mut url = format!(
            "{}/{}?layout={layout}",
            self.base_rest_url(),
            self.config.entity
        );

        if let Some(filter) = &self.config.filter {
            url.push_str("&filter=");
            url.push_str(&urlencoding::encode(filter));
        }

        url
    }

    pub fn bulk_url(&self) -> String {
        format!("{}/bulk", self.base_rest_url())
    }

    pub fn file_url(&self, file_id: &str) -> String {
        format!("{}/frs/file-list/{file_id}", self.base_rest_url())
    }
}
