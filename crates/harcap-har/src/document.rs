//! HAR 1.2 document model and builder.
//!
//! The builder folds accumulated [`NetworkRecord`]s into one entry per
//! record that carries request data; records without a request are omitted
//! entirely. Timing fields the capture pipeline does not measure are
//! emitted as fixed placeholders so the document stays loadable by HAR
//! viewers.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use harcap_core::{Headers, NetworkRecord};

/// HAR format version emitted in every document.
pub const HAR_VERSION: &str = "1.2";

/// Placeholder for the per-entry `time` field (not measured).
const PLACEHOLDER_TIME_MS: i64 = 100;

/// MIME type used when the response did not report one.
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// HTTP version used when the source did not report a protocol.
const FALLBACK_HTTP_VERSION: &str = "HTTP/1.1";

/// Top-level HAR document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
    /// The single log object a HAR file consists of.
    pub log: HarLog,
}

/// The `log` object: version, creator, entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarLog {
    /// HAR format version (always [`HAR_VERSION`]).
    pub version: String,
    /// Tool that produced the document.
    pub creator: HarCreator,
    /// One entry per captured request.
    pub entries: Vec<HarEntry>,
}

/// Identifies the producing tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarCreator {
    /// Tool name.
    pub name: String,
    /// Tool version.
    pub version: String,
}

impl Default for HarCreator {
    fn default() -> Self {
        Self {
            name: "harcap".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// One captured request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    /// ISO8601 instant of the initiation event.
    pub started_date_time: String,
    /// Total entry time; fixed placeholder, not measured.
    pub time: i64,
    /// Request half.
    pub request: HarRequest,
    /// Response half (placeholder when the request never completed).
    pub response: HarResponse,
    /// Cache info; always empty (not tracked).
    pub cache: HarCache,
    /// Phase timings; fixed placeholders, not measured.
    pub timings: HarTimings,
}

/// Request half of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    /// HTTP method.
    pub method: String,
    /// Full URL.
    pub url: String,
    /// Always `HTTP/1.1`; the initiation event does not carry a protocol.
    pub http_version: String,
    /// Request headers.
    pub headers: Vec<HarHeader>,
    /// Query parameters; not extracted (always empty).
    pub query_string: Vec<HarHeader>,
    /// Not measured; `-1` per the HAR convention for unknown sizes.
    pub headers_size: i64,
    /// Not measured; `-1` per the HAR convention for unknown sizes.
    pub body_size: i64,
}

/// Response half of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    /// HTTP status, `0` for the never-completed placeholder.
    pub status: i64,
    /// HTTP status text, `Failed` for the placeholder.
    pub status_text: String,
    /// Reported wire protocol, or [`FALLBACK_HTTP_VERSION`].
    pub http_version: String,
    /// Response headers.
    pub headers: Vec<HarHeader>,
    /// Response content metadata and harvested body.
    pub content: HarContent,
    /// Not measured; `-1` per the HAR convention for unknown sizes.
    pub headers_size: i64,
    /// Not measured; `-1` per the HAR convention for unknown sizes.
    pub body_size: i64,
    /// Always empty; absent on the placeholder response.
    #[serde(rename = "redirectURL", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// A single name/value pair (headers, query parameters).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Response content: size, type, and the optionally harvested body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    /// Encoded byte length reported at loading-finished, else `0`. Absent
    /// on the placeholder response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Number>,
    /// Response MIME type or [`FALLBACK_MIME_TYPE`]. Absent on the
    /// placeholder response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Harvested body text; absent when the harvest failed or the body was
    /// empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `base64` when `text` holds base64-encoded binary data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Cache info; emitted as an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarCache {}

/// Phase timings; emitted as fixed placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarTimings {
    /// Send phase; not measured.
    pub send: i64,
    /// Wait phase; not measured.
    pub wait: i64,
    /// Receive phase; not measured.
    pub receive: i64,
}

impl Default for HarTimings {
    fn default() -> Self {
        Self {
            send: 0,
            wait: 0,
            receive: 0,
        }
    }
}

/// Build a HAR document from accumulated records.
///
/// Records without request data are skipped. Entries are ordered by start
/// instant (ties broken by request identifier) so output is deterministic
/// regardless of map iteration order.
pub fn build_har<'a, I>(records: I) -> Har
where
    I: IntoIterator<Item = &'a NetworkRecord>,
{
    let mut records: Vec<&NetworkRecord> = records.into_iter().collect();
    records.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.request_id.as_str().cmp(b.request_id.as_str()))
    });

    let entries = records.iter().filter_map(|rec| build_entry(rec)).collect();

    Har {
        log: HarLog {
            version: HAR_VERSION.to_owned(),
            creator: HarCreator::default(),
            entries,
        },
    }
}

/// Serialize a document the way it is written to disk (2-space indent).
pub fn to_pretty_json(har: &Har) -> serde_json::Result<String> {
    serde_json::to_string_pretty(har)
}

fn build_entry(record: &NetworkRecord) -> Option<HarEntry> {
    let request = record.request.as_ref()?;

    let response = match &record.response {
        Some(resp) => {
            let body = record.body.as_deref().filter(|b| !b.is_empty());
            HarResponse {
                status: resp.status,
                status_text: resp.status_text.clone(),
                http_version: resp
                    .protocol
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .unwrap_or(FALLBACK_HTTP_VERSION)
                    .to_owned(),
                headers: header_pairs(&resp.headers),
                content: HarContent {
                    size: Some(json_number(record.encoded_data_length.unwrap_or(0.0))),
                    mime_type: Some(
                        resp.mime_type
                            .as_deref()
                            .filter(|m| !m.is_empty())
                            .unwrap_or(FALLBACK_MIME_TYPE)
                            .to_owned(),
                    ),
                    text: body.map(str::to_owned),
                    encoding: (body.is_some() && record.body_base64)
                        .then(|| "base64".to_owned()),
                },
                headers_size: -1,
                body_size: -1,
                redirect_url: Some(String::new()),
            }
        }
        None => HarResponse {
            status: 0,
            status_text: "Failed".to_owned(),
            http_version: String::new(),
            headers: Vec::new(),
            content: HarContent::default(),
            headers_size: -1,
            body_size: -1,
            redirect_url: None,
        },
    };

    Some(HarEntry {
        started_date_time: record
            .started_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        time: PLACEHOLDER_TIME_MS,
        request: HarRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            http_version: FALLBACK_HTTP_VERSION.to_owned(),
            headers: header_pairs(&request.headers),
            query_string: Vec::new(),
            headers_size: -1,
            body_size: -1,
        },
        response,
        cache: HarCache {},
        timings: HarTimings::default(),
    })
}

fn header_pairs(headers: &Headers) -> Vec<HarHeader> {
    headers
        .iter()
        .map(|(name, value)| HarHeader {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

/// Render a byte length as a JSON number, integral when it has no
/// fractional part.
#[allow(clippy::cast_possible_truncation)]
fn json_number(value: f64) -> Number {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9e15 {
        Number::from(value as i64)
    } else {
        Number::from_f64(value).unwrap_or_else(|| Number::from(0))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use harcap_core::{RequestInfo, ResponseInfo};

    fn request_info(url: &str) -> RequestInfo {
        let mut headers = Headers::new();
        let _ = headers.insert("Accept".to_owned(), "*/*".to_owned());
        RequestInfo {
            method: "GET".to_owned(),
            url: url.to_owned(),
            headers,
        }
    }

    fn response_info(status: i64) -> ResponseInfo {
        let mut headers = Headers::new();
        let _ = headers.insert("Content-Type".to_owned(), "text/html".to_owned());
        ResponseInfo {
            status,
            status_text: "OK".to_owned(),
            protocol: Some("h2".to_owned()),
            headers,
            mime_type: Some("text/html".to_owned()),
        }
    }

    fn record(id: &str, secs: i64) -> NetworkRecord {
        NetworkRecord::started(
            id.into(),
            Utc.timestamp_opt(secs, 0).unwrap(),
            request_info("https://example.com/"),
        )
    }

    #[test]
    fn entries_match_records_with_requests() {
        let mut with_request = record("r1", 10);
        with_request.response = Some(response_info(200));

        let mut without_request = record("r2", 11);
        without_request.request = None;

        let har = build_har([&with_request, &without_request]);
        assert_eq!(har.log.entries.len(), 1);
        assert_eq!(har.log.version, "1.2");
        assert_eq!(har.log.creator.name, "harcap");
    }

    #[test]
    fn empty_records_yield_empty_entries() {
        let har = build_har([]);
        assert!(har.log.entries.is_empty());

        let json = serde_json::to_value(&har).unwrap();
        assert_eq!(json["log"]["version"], "1.2");
        assert!(json["log"]["entries"].as_array().unwrap().is_empty());
    }

    #[test]
    fn entries_are_ordered_by_start_time() {
        let late = record("a-first-alphabetically", 100);
        let early = record("z-last-alphabetically", 50);

        let har = build_har([&late, &early]);
        assert_eq!(har.log.entries.len(), 2);
        assert!(har.log.entries[0].started_date_time < har.log.entries[1].started_date_time);
    }

    #[test]
    fn started_date_time_is_iso8601_with_millis() {
        let rec = record("r1", 1_700_000_000);
        let har = build_har([&rec]);
        assert_eq!(
            har.log.entries[0].started_date_time,
            "2023-11-14T22:13:20.000Z"
        );
    }

    #[test]
    fn completed_response_is_rendered() {
        let mut rec = record("r1", 10);
        rec.response = Some(response_info(200));
        rec.finished = true;
        rec.encoded_data_length = Some(3448.0);
        rec.body = Some("ok".to_owned());

        let har = build_har([&rec]);
        let entry = &har.log.entries[0];
        assert_eq!(entry.response.status, 200);
        assert_eq!(entry.response.http_version, "h2");
        assert_eq!(entry.response.redirect_url.as_deref(), Some(""));
        assert_eq!(entry.response.content.text.as_deref(), Some("ok"));
        assert!(entry.response.content.encoding.is_none());
        assert_eq!(
            entry.response.content.size,
            Some(Number::from(3448))
        );
        assert_eq!(entry.response.content.mime_type.as_deref(), Some("text/html"));
    }

    #[test]
    fn base64_bodies_set_the_encoding_flag() {
        let mut rec = record("r1", 10);
        rec.response = Some(response_info(200));
        rec.body = Some("aGVsbG8=".to_owned());
        rec.body_base64 = true;

        let har = build_har([&rec]);
        let content = &har.log.entries[0].response.content;
        assert_eq!(content.encoding.as_deref(), Some("base64"));
    }

    #[test]
    fn empty_body_omits_text_and_encoding() {
        let mut rec = record("r1", 10);
        rec.response = Some(response_info(204));
        rec.body = Some(String::new());
        rec.body_base64 = true;

        let har = build_har([&rec]);
        let content = &har.log.entries[0].response.content;
        assert!(content.text.is_none());
        assert!(content.encoding.is_none());
    }

    #[test]
    fn missing_protocol_and_mime_fall_back() {
        let mut rec = record("r1", 10);
        rec.response = Some(ResponseInfo {
            status: 200,
            status_text: String::new(),
            protocol: Some(String::new()),
            headers: Headers::new(),
            mime_type: None,
        });

        let har = build_har([&rec]);
        let entry = &har.log.entries[0];
        assert_eq!(entry.response.http_version, "HTTP/1.1");
        assert_eq!(
            entry.response.content.mime_type.as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn never_completed_request_gets_placeholder_response() {
        let rec = record("r1", 10);
        let har = build_har([&rec]);

        let entry = &har.log.entries[0];
        assert_eq!(entry.response.status, 0);
        assert_eq!(entry.response.status_text, "Failed");
        assert_eq!(entry.response.http_version, "");
        assert!(entry.response.headers.is_empty());
        assert_eq!(entry.response.content, HarContent::default());

        let json = serde_json::to_value(entry).unwrap();
        assert!(json["response"].get("redirectURL").is_none());
        assert_eq!(json["response"]["content"], serde_json::json!({}));
    }

    #[test]
    fn placeholder_fields_serialize_camel_case() {
        let mut rec = record("r1", 10);
        rec.response = Some(response_info(301));

        let har = build_har([&rec]);
        let json = serde_json::to_value(&har.log.entries[0]).unwrap();

        assert!(json.get("startedDateTime").is_some());
        assert_eq!(json["time"], 100);
        assert_eq!(json["request"]["httpVersion"], "HTTP/1.1");
        assert_eq!(json["request"]["queryString"], serde_json::json!([]));
        assert_eq!(json["request"]["headersSize"], -1);
        assert_eq!(json["request"]["bodySize"], -1);
        assert_eq!(json["response"]["redirectURL"], "");
        assert_eq!(json["cache"], serde_json::json!({}));
        assert_eq!(
            json["timings"],
            serde_json::json!({"send": 0, "wait": 0, "receive": 0})
        );
    }

    #[test]
    fn headers_render_as_name_value_pairs() {
        let rec = record("r1", 10);
        let har = build_har([&rec]);
        let headers = &har.log.entries[0].request.headers;
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].name, "Accept");
        assert_eq!(headers[0].value, "*/*");
    }

    #[test]
    fn fractional_sizes_stay_fractional() {
        let mut rec = record("r1", 10);
        rec.response = Some(response_info(200));
        rec.encoded_data_length = Some(10.5);

        let har = build_har([&rec]);
        let json = serde_json::to_value(&har.log.entries[0]).unwrap();
        assert_eq!(json["response"]["content"]["size"], 10.5);
    }

    #[test]
    fn missing_encoded_length_sizes_zero() {
        let mut rec = record("r1", 10);
        rec.response = Some(response_info(200));

        let har = build_har([&rec]);
        let json = serde_json::to_value(&har.log.entries[0]).unwrap();
        assert_eq!(json["response"]["content"]["size"], 0);
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let har = build_har([]);
        let text = to_pretty_json(&har).unwrap();
        assert!(text.starts_with("{\n  \"log\""));
    }
}
