//! Remote catalogue and file transfer.

use std::collections::BTreeMap;
use std::io::Read;

use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;

use super::naming::{compare_versions, ArchiveQuery, FileDescriptor};
use crate::config::Settings;
use crate::error::{DatasetError, Result};

/// Lists archive files matching instrument parameters and a date window.
pub trait Catalogue {
    fn list_files(&self, query: &ArchiveQuery) -> Result<Vec<String>>;
}

/// Opens a byte stream for a URL.
pub trait RemoteSource {
    fn open(&self, url: &str) -> Result<RemoteBody>;
}

/// An open transfer: the body stream and its advertised size, if any.
pub struct RemoteBody {
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read>,
}

impl RemoteBody {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        RemoteBody {
            content_length: Some(bytes.len() as u64),
            reader: Box::new(std::io::Cursor::new(bytes)),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing response
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Listing {
    files: Vec<ListedFile>,
}

/// The science API answers with objects; older mirrors answer with bare names.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListedFile {
    Name(String),
    Info { file_name: String },
}

impl ListedFile {
    fn into_name(self) -> String {
        match self {
            ListedFile::Name(name) | ListedFile::Info { file_name: name } => name,
        }
    }
}

/// Parse a catalogue listing body into file names.
pub fn parse_listing(body: &str) -> Result<Vec<String>> {
    let listing: Listing = serde_json::from_str(body)?;
    Ok(listing.files.into_iter().map(ListedFile::into_name).collect())
}

/// Sort names, drop duplicates, and keep only the newest version of each file.
///
/// Names that do not parse as archive file names are kept as they are.
pub fn latest_versions(names: Vec<String>) -> Vec<String> {
    let mut by_stem: BTreeMap<String, FileDescriptor> = BTreeMap::new();
    let mut unparsed = Vec::new();
    for name in names {
        match FileDescriptor::parse(&name) {
            Ok(desc) => {
                let stem = desc.stem().to_string();
                match by_stem.get(&stem) {
                    Some(kept) if compare_versions(kept, &desc).is_ge() => {}
                    _ => {
                        by_stem.insert(stem, desc);
                    }
                }
            }
            Err(_) => unparsed.push(name),
        }
    }
    let mut kept: Vec<String> = by_stem.into_values().map(|d| d.name).chain(unparsed).collect();
    kept.sort();
    kept.dedup();
    kept
}

// ---------------------------------------------------------------------------
// SdcClient
// ---------------------------------------------------------------------------

/// Blocking client for the archive's public science API.
pub struct SdcClient {
    client: Client,
    base_url: String,
}

impl SdcClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder().timeout(settings.http_timeout()).build()?;
        Ok(SdcClient {
            client,
            base_url: settings.archive_base_url.clone(),
        })
    }

    /// Use a preconfigured client, e.g. with custom proxy or TLS settings.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        SdcClient {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DatasetError::Transport {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl Catalogue for SdcClient {
    fn list_files(&self, query: &ArchiveQuery) -> Result<Vec<String>> {
        let url = query.listing_url(&self.base_url);
        debug!("Listing archive files: {url}");
        let body = self.get(&url)?.text()?;
        let names = latest_versions(parse_listing(&body)?);
        info!(
            "Catalogue lists {} file(s) for {}_{}_{}_{} {}..{}",
            names.len(),
            query.probe,
            query.instrument,
            query.rate,
            query.level,
            query.start,
            query.end
        );
        Ok(names)
    }
}

impl RemoteSource for SdcClient {
    fn open(&self, url: &str) -> Result<RemoteBody> {
        let response = self.get(url)?;
        Ok(RemoteBody {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use chrono::NaiveDate;

    use super::*;
    use crate::archive::naming::download_url;

    #[test]
    fn test_parse_listing_objects_and_names() {
        let body = r#"{"files": [
            {"file_name": "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.4.0.cdf", "file_size": 10},
            "mms1_fpi_fast_l2_dis-dist_20171204020000_v3.4.0.cdf"
        ]}"#;
        let names = parse_listing(body).unwrap();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("000000_v3.4.0.cdf"));
    }

    #[test]
    fn test_parse_listing_rejects_garbage() {
        assert!(matches!(parse_listing("not json"), Err(DatasetError::Json(_))));
    }

    #[test]
    fn test_latest_versions_keeps_newest_and_sorts() {
        let names = vec![
            "mms1_fpi_fast_l2_dis-dist_20171204020000_v3.4.0.cdf".to_string(),
            "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.4.0.cdf".to_string(),
            "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.3.0.cdf".to_string(),
            "mms1_fpi_fast_l2_dis-dist_20171204020000_v3.4.0.cdf".to_string(),
        ];
        assert_eq!(
            latest_versions(names),
            vec![
                "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.4.0.cdf".to_string(),
                "mms1_fpi_fast_l2_dis-dist_20171204020000_v3.4.0.cdf".to_string(),
            ]
        );
    }

    // -- SdcClient against a local HTTP server --

    const LISTED: &str = r#"{"files": [
        {"file_name": "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.3.0.cdf"},
        {"file_name": "mms1_fpi_fast_l2_dis-dist_20171204000000_v3.4.0.cdf"}
    ]}"#;

    /// Serve canned answers, one connection per request, and return the base URL.
    fn serve() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = stream.unwrap();
                let mut request = String::new();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                reader.read_line(&mut request).unwrap();
                let mut line = String::new();
                while reader.read_line(&mut line).unwrap() > 2 {
                    line.clear();
                }

                let (status, body) = if request.contains("/file_info/science") {
                    ("200 OK", LISTED)
                } else if request.contains("/download/science") {
                    ("200 OK", "cdf-bytes")
                } else {
                    ("404 Not Found", "no such file")
                };
                write!(
                    stream,
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
        });
        format!("http://{addr}/api/v1/")
    }

    fn local_client() -> SdcClient {
        let mut settings = Settings::from_env();
        settings.archive_base_url = serve();
        let client = Client::builder()
            .no_proxy()
            .timeout(settings.http_timeout())
            .build()
            .unwrap();
        SdcClient::with_client(client, settings.archive_base_url)
    }

    #[test]
    fn test_client_lists_latest_versions() {
        let client = local_client();
        let query = ArchiveQuery {
            start: NaiveDate::from_ymd_opt(2017, 12, 4).unwrap(),
            end: NaiveDate::from_ymd_opt(2017, 12, 5).unwrap(),
            probe: "mms1".into(),
            instrument: "fpi".into(),
            rate: "fast".into(),
            level: "l2".into(),
            descriptor: Some("dis-dist".into()),
        };
        assert_eq!(
            client.list_files(&query).unwrap(),
            vec!["mms1_fpi_fast_l2_dis-dist_20171204000000_v3.4.0.cdf".to_string()]
        );
    }

    #[test]
    fn test_client_open_reports_length() {
        let client = local_client();
        let url = download_url(client.base_url(), "a.cdf");
        let mut body = client.open(&url).unwrap();
        assert_eq!(body.content_length, Some(9));
        let mut text = String::new();
        body.reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "cdf-bytes");
    }

    #[test]
    fn test_client_maps_http_status() {
        let client = local_client();
        let url = format!("{}missing", client.base_url());
        match client.open(&url) {
            Err(DatasetError::Transport { status, url: failed }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected a transport error, got {:?}", other.err()),
        }
    }
}
