//! Prometheus HTTP API client.
//!
//! Issues `GET /api/v1/query` and `GET /api/v1/query_range` over HTTP/1.1,
//! plain or TLS (`https://` bases, verified against the Mozilla roots), and
//! decodes the JSON envelope:
//!
//! ```text
//! {"status":"success","data":{"resultType":"vector","result":[{"metric":{..},"value":[ts,"1"]}]}}
//! {"status":"error","errorType":"bad_data","error":"parse error ..."}
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use rustls::pki_types::ServerName;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;

use statusgrid_config::QueryDefinition;

use crate::client::{MetricsClient, QueryFuture, Sample};
use crate::error::QueryError;

const USER_AGENT: &str = concat!("statusgrid/", env!("CARGO_PKG_VERSION"));

/// Response envelope shared by every Prometheus API endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum QueryData {
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
    Scalar(RawPoint),
    String(RawPoint),
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    value: RawPoint,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    values: Vec<RawPoint>,
}

/// `[<unix seconds>, "<value>"]`
type RawPoint = (f64, String);

fn parse_point((timestamp, raw): &RawPoint) -> Result<Sample, QueryError> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| QueryError::Decode(format!("sample value {raw:?} is not a number")))?;
    Ok(Sample {
        timestamp: *timestamp,
        value,
    })
}

impl QueryData {
    /// Collapse an instant query result to a single value.
    fn into_value(self) -> Result<f64, QueryError> {
        let point = match self {
            QueryData::Vector(samples) => samples.into_iter().next().map(|s| s.value),
            QueryData::Matrix(series) => series
                .into_iter()
                .next()
                .and_then(|s| s.values.into_iter().last()),
            QueryData::Scalar(point) | QueryData::String(point) => Some(point),
        };
        point
            .ok_or(QueryError::NoData)
            .and_then(|p| parse_point(&p))
            .map(|s| s.value)
    }

    /// The first series of a range query result.
    fn into_series(self) -> Result<Vec<Sample>, QueryError> {
        match self {
            QueryData::Matrix(series) => series
                .into_iter()
                .next()
                .ok_or(QueryError::NoData)?
                .values
                .iter()
                .map(parse_point)
                .collect(),
            other => Err(QueryError::Decode(format!(
                "range query returned {} instead of a matrix",
                other.kind()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            QueryData::Vector(_) => "vector",
            QueryData::Matrix(_) => "matrix",
            QueryData::Scalar(_) => "scalar",
            QueryData::String(_) => "string",
        }
    }
}

/// TLS client configuration trusting the Mozilla root certificate store.
fn default_tls_config() -> Result<Arc<rustls::ClientConfig>, QueryError> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(
        rustls::crypto::ring::default_provider().into(),
    )
    .with_safe_default_protocol_versions()
    .map_err(|e| QueryError::Address(format!("tls protocol version error: {e}")))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Client for a single Prometheus server.
#[derive(Clone)]
pub struct PrometheusClient {
    base: Url,
    timeout: Duration,
    /// Present for `https` bases.
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl fmt::Debug for PrometheusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl PrometheusClient {
    /// Create a client for `base_url` (e.g. `http://prometheus:9090` or
    /// `https://prometheus.example.com/prom`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let mut base =
            Url::parse(base_url.trim()).map_err(|e| QueryError::Address(e.to_string()))?;
        let tls = match base.scheme() {
            "http" => None,
            "https" => Some(default_tls_config()?),
            other => {
                return Err(QueryError::Address(format!("unsupported scheme {other:?}")));
            }
        };
        if base.host_str().is_none() {
            return Err(QueryError::Address(format!("{base_url:?} has no host")));
        }
        // Keep any path prefix so `join` appends instead of replacing.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, timeout, tls })
    }

    /// Replace the TLS configuration, e.g. to trust a private CA.
    /// Has no effect on `http` bases.
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        if self.tls.is_some() {
            self.tls = Some(config);
        }
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, QueryError> {
        self.base
            .join(path)
            .map_err(|e| QueryError::Address(e.to_string()))
    }

    fn instant_url(&self, query: &QueryDefinition) -> Result<Url, QueryError> {
        let mut url = self.endpoint("api/v1/query")?;
        url.query_pairs_mut().append_pair("query", &query.query);
        Ok(url)
    }

    fn range_url(&self, query: &QueryDefinition, end: SystemTime) -> Result<Url, QueryError> {
        let end_secs = end
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let start_secs = (end_secs - query.range.as_secs_f64()).max(0.0);

        let mut url = self.endpoint("api/v1/query_range")?;
        url.query_pairs_mut()
            .append_pair("query", &query.query)
            .append_pair("start", &format!("{start_secs:.3}"))
            .append_pair("end", &format!("{end_secs:.3}"))
            .append_pair("step", &format!("{}", query.step.as_secs_f64()));
        Ok(url)
    }

    /// GET `url` and decode the Prometheus envelope, bounded by the timeout.
    async fn fetch(&self, url: Url) -> Result<QueryData, QueryError> {
        match tokio::time::timeout(self.timeout, self.fetch_inner(&url)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%url, "prometheus request timed out");
                Err(QueryError::Timeout(self.timeout.as_millis()))
            }
        }
    }

    async fn fetch_inner(&self, url: &Url) -> Result<QueryData, QueryError> {
        let host = url
            .host_str()
            .ok_or_else(|| QueryError::Address(url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = format!("{host}:{port}");

        let stream = tokio::net::TcpStream::connect(&authority)
            .await
            .map_err(|e| QueryError::Connect(e.to_string()))?;

        let (status, body) = match &self.tls {
            Some(config) => {
                // IPv6 literals are bracketed in URLs but not in server names.
                let name = host.trim_start_matches('[').trim_end_matches(']');
                let server_name = ServerName::try_from(name.to_string())
                    .map_err(|e| QueryError::Address(format!("invalid server name: {e}")))?;
                let stream = TlsConnector::from(Arc::clone(config))
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| QueryError::Connect(format!("tls handshake failed: {e}")))?;
                send_get(stream, url, &authority).await?
            }
            None => send_get(stream, url, &authority).await?,
        };

        debug!(%url, status, bytes = body.len(), "prometheus response");

        decode_envelope(status, &body)
    }
}

/// Issue one GET over an established connection and collect the response.
async fn send_get<S>(stream: S, url: &Url, authority: &str) -> Result<(u16, Bytes), QueryError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| QueryError::Connect(e.to_string()))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "prometheus connection closed with error");
        }
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(&url[url::Position::BeforePath..])
        .header("host", authority)
        .header("accept", "application/json")
        .header("user-agent", USER_AGENT)
        .body(Empty::<Bytes>::new())
        .map_err(|e| QueryError::Address(e.to_string()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| QueryError::Connect(e.to_string()))?;
    let status = resp.status().as_u16();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| QueryError::Connect(e.to_string()))?
        .to_bytes();

    Ok((status, body))
}

/// Turn a raw HTTP response into query data or a typed error.
///
/// Prometheus reports query errors with a 4xx status *and* a JSON body, so
/// the body is inspected before the status code.
fn decode_envelope(status: u16, body: &[u8]) -> Result<QueryData, QueryError> {
    let envelope = match serde_json::from_slice::<Envelope>(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(QueryError::Decode(e.to_string()));
        }
        Err(_) => {
            return Err(QueryError::Http {
                status,
                body: String::from_utf8_lossy(body).chars().take(256).collect(),
            });
        }
    };

    if envelope.status != "success" {
        return Err(QueryError::Backend {
            error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
            error: envelope.error.unwrap_or_default(),
        });
    }

    envelope
        .data
        .ok_or_else(|| QueryError::Decode("success response without data".to_string()))
}

impl MetricsClient for PrometheusClient {
    fn query<'a>(&'a self, query: &'a QueryDefinition) -> QueryFuture<'a, f64> {
        Box::pin(async move {
            let url = self.instant_url(query)?;
            self.fetch(url).await?.into_value()
        })
    }

    fn query_range<'a>(
        &'a self,
        query: &'a QueryDefinition,
        end: SystemTime,
    ) -> QueryFuture<'a, Vec<Sample>> {
        Box::pin(async move {
            let url = self.range_url(query, end)?;
            self.fetch(url).await?.into_series()
        })
    }
}
