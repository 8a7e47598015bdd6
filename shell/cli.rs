/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::io::Write;
use std::path::PathBuf;

use bpaf::Bpaf;
use http::header::{HeaderName, HeaderValue};
use http::Method;
use url::Url;

use crate::runtime::diagnostics::channel_counts;
use crate::runtime::protocols::request::{ProtocolRequest, UploadData};
use crate::runtime::protocols::router::SchemeRouter;
use crate::shell::config::RouterConfig;
use crate::shell::routes::mount_routes;

/// Dispatch requests through a configured scheme router.
#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
pub struct Options {
    /// Router configuration file (TOML)
    #[bpaf(long, short, argument("PATH"))]
    pub config: Option<PathBuf>,
    /// Tracing filter, e.g. `schemeshell=debug`
    #[bpaf(long("tracing-filter"), argument("FILTER"))]
    pub tracing_filter: Option<String>,
    /// Print per-channel diagnostic counts to stderr on exit
    #[bpaf(long)]
    pub diagnostics: bool,
    #[bpaf(external(command))]
    pub command: Command,
}

#[derive(Debug, Clone, Bpaf)]
pub enum Command {
    /// Dispatch one request and print the response
    #[bpaf(command)]
    Fetch {
        /// Request method
        #[bpaf(long("method"), short('X'), argument("METHOD"), fallback("GET".to_string()))]
        method: String,
        /// Extra request header
        #[bpaf(long("header"), short('H'), argument("NAME:VALUE"))]
        headers: Vec<String>,
        /// Request body
        #[bpaf(long("data"), short('d'), argument("BODY"))]
        data: Option<String>,
        /// Only print the body
        #[bpaf(long("body-only"))]
        body_only: bool,
        /// URL to request
        #[bpaf(positional("URL"))]
        url: String,
    },
    /// List the schemes the configured router handles
    #[bpaf(command)]
    Schemes,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] crate::shell::config::ConfigError),
    #[error("network error: {0}")]
    Network(#[from] crate::runtime::protocols::error::NetworkError),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("output: {0}")]
    Output(#[from] std::io::Error),
}

pub fn main() {
    let options = options().run();
    crate::init_tracing(options.tracing_filter.as_deref());
    tracing::debug!("schemeshell {} starting", crate::VERSION);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("failed to start tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(options)) {
        log::error!("{e}");
        eprintln!("schemeshell: {e}");
        std::process::exit(1);
    }
}

pub async fn run(options: Options) -> Result<(), CliError> {
    let config = RouterConfig::discover(options.config.as_deref())?;
    let (diagnostics_tx, diagnostics_rx) = crossbeam_channel::unbounded();
    let router = SchemeRouter::builder(config.router_options())
        .diagnostics(diagnostics_tx)
        .build()?;
    mount_routes(&router, &config.routes)?;

    let result = match options.command {
        Command::Schemes => print_schemes(&router),
        Command::Fetch {
            method,
            headers,
            data,
            body_only,
            url,
        } => {
            let request = build_request(&url, &method, &headers, data)?;
            fetch(&router, request, body_only).await
        }
    };

    router.shutdown();
    if options.diagnostics {
        for (channel, count) in channel_counts(&diagnostics_rx) {
            eprintln!("{channel}\t{count}");
        }
    }
    result
}

fn print_schemes(router: &SchemeRouter) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    for scheme in register_protocol::BUILTIN_SCHEMES {
        let intercepted = if router.is_intercepted(scheme) { "intercepted" } else { "builtin" };
        writeln!(out, "{scheme}\t{intercepted}")?;
    }
    for scheme in router.registered_schemes() {
        writeln!(out, "{scheme}\tregistered")?;
    }
    for scheme in router.intercepted_schemes() {
        if !register_protocol::is_builtin_scheme(&scheme) {
            writeln!(out, "{scheme}\tintercepted")?;
        }
    }
    Ok(())
}

async fn fetch(router: &SchemeRouter, request: ProtocolRequest, body_only: bool) -> Result<(), CliError> {
    let response = router.dispatch(request).await?;
    let mut out = std::io::stdout().lock();
    if !body_only {
        writeln!(out, "{} {}", response.status, response.url)?;
        for (name, value) in &response.headers {
            writeln!(out, "{name}: {}", value.to_str().unwrap_or("<binary>"))?;
        }
        writeln!(out)?;
    }
    drop(out);

    let body = response.body.collect().await?;
    let mut out = std::io::stdout().lock();
    out.write_all(&body)?;
    out.flush()?;
    Ok(())
}

pub fn build_request(
    url: &str,
    method: &str,
    headers: &[String],
    data: Option<String>,
) -> Result<ProtocolRequest, CliError> {
    let url = Url::parse(url).map_err(|e| CliError::Request(format!("url '{url}': {e}")))?;
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::Request(format!("method '{method}'")))?;

    let mut request = ProtocolRequest::new(url, method);
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| CliError::Request(format!("header '{header}' is not NAME:VALUE")))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| CliError::Request(format!("header name '{name}'")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| CliError::Request(format!("header value for '{name}'")))?;
        request = request.with_header(name, value);
    }
    if let Some(data) = data {
        let content_type = request
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        request = request.with_upload(UploadData::new(content_type.as_deref(), data));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_parses_headers_and_body() {
        let request = build_request(
            "atom://host/form",
            "post",
            &["Content-Type: application/json".to_string(), "X-Trace:1".to_string()],
            Some("{}".to_string()),
        )
        .expect("request");

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.headers()["x-trace"], "1");
        assert_eq!(request.upload_data()[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(request.body_bytes().as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn malformed_header_is_rejected() {
        let err = build_request("atom://host/", "GET", &["no-colon".to_string()], None)
            .expect_err("malformed header");
        assert!(matches!(err, CliError::Request(_)));
    }

    #[test]
    fn fetch_command_parses() {
        let parsed = options()
            .run_inner(&["fetch", "-X", "POST", "-H", "A:b", "atom://host/"][..])
            .expect("parse");
        match parsed.command {
            Command::Fetch { method, headers, url, .. } => {
                assert_eq!(method, "POST");
                assert_eq!(headers, vec!["A:b".to_string()]);
                assert_eq!(url, "atom://host/");
            }
            Command::Schemes => panic!("expected fetch"),
        }
    }
}
