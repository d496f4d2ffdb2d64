use clap::Parser;
use lurk_socks5::{
    proto::socks5::Command,
    server::config::{HostAddressRewriter, LurkServerConfig},
};
use std::{sync::Arc, time::Duration};

pub const LOG4RS_CONFIG_FILE_PATH: &str = "log4rs.yaml";
pub const LOG4RS_FALLBACK_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l}):5.5} [{M}] {m}{n}";

#[derive(Parser, Debug)]
#[clap(about = "SOCKS5 proxy server", version)]
pub struct LurkCliConfig {
    /// Address to listen on, `host:port` or `:port` for all interfaces
    #[clap(short = 'a', long, default_value = "0.0.0.0:1080")]
    bind_addr: String,

    /// Username required from clients, enables username/password authentication
    #[clap(short = 'u', long)]
    username: Option<String>,

    /// Password required from clients, enables username/password authentication
    #[clap(short = 'p', long)]
    password: Option<String>,

    /// Interval of TCP keepalive probes in seconds, 0 disables keepalive
    #[clap(short = 'k', long, default_value_t = 0)]
    keepalive_secs: u64,

    /// Serve BIND command in addition to CONNECT
    #[clap(long)]
    allow_bind: bool,

    /// Host reported to clients in place of the bound address host
    #[clap(long)]
    response_host: Option<String>,
}

impl LurkCliConfig {
    pub fn server_config(&self) -> LurkServerConfig {
        let mut builder = LurkServerConfig::builder();

        builder
            .with_listen_addr(self.bind_addr.as_str())
            .with_keepalive_interval(Duration::from_secs(self.keepalive_secs));

        if self.username.is_some() || self.password.is_some() {
            builder.with_credentials(
                self.username.as_deref().unwrap_or_default(),
                self.password.as_deref().unwrap_or_default(),
            );
        }

        if self.allow_bind {
            builder.with_allowed_commands([Command::Connect, Command::Bind]);
        }

        if let Some(host) = &self.response_host {
            builder.with_address_rewriter(Arc::new(HostAddressRewriter::new(host.as_str())));
        }

        builder.build()
    }
}
