use std::{io::Write, path::Path};

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tempfile::TempPath;
use tracing::{debug, info, warn};
use url::Url;

use super::error::Error;

lazy_static! {
    // A run of slashes is only collapsed when not preceded by ':', so
    // scheme separators survive.
    static ref SLASH_RUN: Regex = Regex::new(r"(^|[^:])/{2,}").unwrap();
    static ref SCHEMA_LOCATION: Regex = Regex::new(r#"schemaLocation="([^"]+)""#).unwrap();
    static ref IMPORT_LOCATION: Regex = Regex::new(r#"location="([^"]+)""#).unwrap();
}

/// A rewritten WSDL persisted to a `.wsdl` temporary file. The file is
/// removed when this handle is dropped.
#[derive(Debug)]
pub struct RewrittenWsdl {
    path: TempPath,
}

impl RewrittenWsdl {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Downloads the WSDL at `wsdl_url`, fixes `[servidor]` placeholders and
/// schema/import locations against `server_base`, and persists the result.
pub fn rewrite(
    client: &reqwest::blocking::Client,
    wsdl_url: &str,
    server_base: &str,
) -> Result<RewrittenWsdl, Error> {
    info!("downloading WSDL for rewriting: {wsdl_url}");
    let content = crate::fetch_text(client, wsdl_url)?;
    let rewritten = rewrite_text(&content, wsdl_url, server_base);

    let mut file = tempfile::Builder::new().suffix(".wsdl").tempfile()?;
    file.write_all(rewritten.as_bytes())?;
    file.flush()?;

    let path = file.into_temp_path();
    info!("rewritten WSDL saved to {}", path.display());
    Ok(RewrittenWsdl { path })
}

pub fn rewrite_text(content: &str, wsdl_url: &str, server_base: &str) -> String {
    let server = server_base.trim_end_matches('/');

    let substituted = content.replace("[servidor]", &format!("{server}/"));
    let collapsed = collapse_slashes(&substituted);

    let schemas = rewrite_locations(&SCHEMA_LOCATION, "schemaLocation", &collapsed, wsdl_url, server);
    rewrite_locations(&IMPORT_LOCATION, "location", &schemas, wsdl_url, server)
}

fn collapse_slashes(text: &str) -> String {
    SLASH_RUN.replace_all(text, "${1}/").into_owned()
}

fn rewrite_locations(
    pattern: &Regex,
    attribute: &str,
    text: &str,
    wsdl_url: &str,
    server: &str,
) -> String {
    pattern
        .replace_all(text, |captures: &Captures<'_>| {
            let original = &captures[1];
            let resolved = resolve_location(original, wsdl_url, server);

            if resolved != original {
                info!("{attribute} rewritten: {original} -> {resolved}");
            } else {
                debug!("{attribute} left as-is: {original}");
            }

            format!(r#"{attribute}="{resolved}""#)
        })
        .into_owned()
}

fn resolve_location(path: &str, wsdl_url: &str, server: &str) -> String {
    if path.starts_with('/') {
        // Absolute on the server.
        format!("{server}{path}")
    } else if path.starts_with("http") {
        path.to_owned()
    } else {
        // Relative to the WSDL's own base (its last path segment dropped).
        match Url::parse(wsdl_url).and_then(|base| base.join(path)) {
            Ok(resolved) => resolved.to_string(),
            Err(err) => {
                warn!("unable to resolve {path} against {wsdl_url}: {err}");
                path.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WSDL_URL: &str = "https://eproc.example/ws/controlador_ws.php/servico?wsdl";
    const SERVER: &str = "https://host.example";

    #[test]
    fn replaces_every_server_placeholder() {
        let content = r#"<soap:address location="[servidor]ws/servico"/> and [servidor]outro"#;
        let rewritten = rewrite_text(content, WSDL_URL, SERVER);

        assert!(!rewritten.contains("[servidor]"));
        assert!(rewritten.contains("https://host.example/ws/servico"));
        assert!(rewritten.contains("https://host.example/outro"));
    }

    #[test]
    fn trailing_slash_on_server_base_does_not_double_up() {
        let rewritten = rewrite_text("[servidor]ws", WSDL_URL, "https://host.example/");
        assert_eq!(rewritten, "https://host.example/ws");
    }

    #[test]
    fn collapses_slash_runs_but_not_scheme_separators() {
        let rewritten = rewrite_text("https://host.example//a///b", WSDL_URL, SERVER);
        assert_eq!(rewritten, "https://host.example/a/b");
    }

    #[test]
    fn collapses_leading_slash_run() {
        assert_eq!(collapse_slashes("//a//b"), "/a/b");
    }

    #[test]
    fn schema_location_absolute_on_server_is_prefixed() {
        let content = r#"<xs:import schemaLocation="/xsd/tipos.xsd"/>"#;
        let rewritten = rewrite_text(content, WSDL_URL, SERVER);

        assert_eq!(
            rewritten,
            r#"<xs:import schemaLocation="https://host.example/xsd/tipos.xsd"/>"#
        );
    }

    #[test]
    fn schema_location_relative_resolves_against_wsdl_base() {
        let content = r#"<xs:include schemaLocation="tipos.xsd"/>"#;
        let rewritten = rewrite_text(content, WSDL_URL, SERVER);

        assert!(rewritten.contains(r#"schemaLocation="https://eproc.example/ws/controlador_ws.php/tipos.xsd""#));
    }

    #[test]
    fn schema_location_full_url_is_untouched() {
        let content = r#"<xs:import schemaLocation="http://outro.example/x.xsd"/>"#;
        let rewritten = rewrite_text(content, WSDL_URL, SERVER);

        assert_eq!(content, rewritten);
    }

    #[test]
    fn import_location_follows_the_same_rules() {
        let content = r#"<wsdl:import location="/wsdl/extra.wsdl" namespace="urn:x"/>"#;
        let rewritten = rewrite_text(content, WSDL_URL, SERVER);

        assert!(rewritten.contains(r#"location="https://host.example/wsdl/extra.wsdl""#));
    }

    #[test]
    fn persisted_file_has_wsdl_suffix_and_is_removed_on_drop() {
        use std::io::Write as _;

        let mut file = tempfile::Builder::new().suffix(".wsdl").tempfile().unwrap();
        file.write_all(b"<definitions/>").unwrap();
        let path = file.into_temp_path();

        let owned = path.to_path_buf();
        assert!(owned.extension().map(|ext| ext == "wsdl").unwrap_or(false));
        assert!(owned.exists());

        drop(path);
        assert!(!owned.exists());
    }
}
