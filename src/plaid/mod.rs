use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use config::Config;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const ENV_PREFIX: &str = "PLAID";
const REQUIRED_KEYS: [&str; 3] = ["client_id", "secret", "access_token"];
const PAGE_SIZE: usize = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const AUTH_ERROR_CODES: [&str; 4] = [
    "INVALID_ACCESS_TOKEN",
    "INVALID_API_KEYS",
    "INVALID_CREDENTIALS",
    "ITEM_LOGIN_REQUIRED",
];

#[derive(Debug, Error)]
pub enum Error {
    #[error("plaid rejected the credentials ({code}): {message}")]
    Auth { code: String, message: String },
    #[error("plaid rate limit exceeded ({code}): {message}")]
    RateLimited { code: String, message: String },
    #[error("plaid request failed with status {status} ({error_type}/{code}): {message}")]
    Api {
        status: u16,
        error_type: String,
        code: String,
        message: String,
    },
    #[error("unknown plaid environment {0:?}, expected one of sandbox, development, production")]
    UnknownEnvironment(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("unexpected response shape from plaid")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Environment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl Environment {
    pub fn host(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://sandbox.plaid.com",
            Environment::Development => "https://development.plaid.com",
            Environment::Production => "https://production.plaid.com",
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(Environment::Sandbox),
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            _ => Err(Error::UnknownEnvironment(s.to_string())),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub secret: String,
    pub access_token: String,
    #[serde(default)]
    pub env: Environment,
}

impl Credentials {
    /// Reads `PLAID_CLIENT_ID`, `PLAID_SECRET`, `PLAID_ACCESS_TOKEN` and the
    /// optional `PLAID_ENV`. Returns `None` when any required value is unset.
    pub fn from_env() -> Result<Option<Self>, config::ConfigError> {
        let source = Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Self::from_config(source)
    }

    fn from_config(source: Config) -> Result<Option<Self>, config::ConfigError> {
        let complete = REQUIRED_KEYS
            .iter()
            .all(|key| matches!(source.get_string(key), Ok(v) if !v.trim().is_empty()));

        if !complete {
            return Ok(None);
        }

        source.try_deserialize().map(Some)
    }
}

#[derive(Debug, Serialize)]
struct TransactionsGetRequest<'a> {
    client_id: &'a str,
    secret: &'a str,
    access_token: &'a str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    options: TransactionsGetRequestOptions,
}

#[derive(Debug, Serialize)]
struct TransactionsGetRequestOptions {
    count: usize,
    offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsGetResponse {
    pub transactions: Vec<Transaction>,
    pub total_transactions: usize,
}

/// Transaction record as returned by `/transactions/get`.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub name: String,
    pub merchant_name: Option<String>,
    pub category: Option<Vec<String>>,
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_message: String,
}

pub struct Plaid {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl Plaid {
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        let host = credentials.env.host();
        Self::with_base_url(credentials, host)
    }

    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub async fn transactions_get(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        offset: usize,
    ) -> Result<TransactionsGetResponse, Error> {
        let req = TransactionsGetRequest {
            client_id: &self.credentials.client_id,
            secret: &self.credentials.secret,
            access_token: &self.credentials.access_token,
            start_date: start,
            end_date: end,
            options: TransactionsGetRequestOptions {
                count: PAGE_SIZE,
                offset,
            },
        };

        debug!(%start, %end, offset, "requesting transactions page");
        let res = self
            .http
            .post(format!("{}/transactions/get", self.base_url))
            .json(&req)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches every transaction between `start` and `end` (both inclusive),
    /// following offsets until the reported total has been received.
    pub async fn transactions(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>, Error> {
        let mut txns: Vec<Transaction> = vec![];

        loop {
            let page = self.transactions_get(start, end, txns.len()).await?;
            let received = page.transactions.len();
            txns.extend(page.transactions);

            if txns.len() >= page.total_transactions {
                break;
            }

            if received == 0 {
                warn!(
                    received = txns.len(),
                    total = page.total_transactions,
                    "plaid returned an empty page before the reported total"
                );
                break;
            }
        }

        Ok(txns)
    }
}

fn classify_error(status: u16, body: &str) -> Error {
    let err: ErrorBody = match serde_json::from_str(body) {
        Ok(err) => err,
        Err(_) => {
            return Error::Api {
                status,
                error_type: "UNKNOWN".to_string(),
                code: "UNKNOWN".to_string(),
                message: body.to_string(),
            }
        }
    };

    if AUTH_ERROR_CODES.contains(&err.error_code.as_str()) {
        return Error::Auth {
            code: err.error_code,
            message: err.error_message,
        };
    }

    if err.error_type == "RATE_LIMIT_EXCEEDED" {
        return Error::RateLimited {
            code: err.error_code,
            message: err.error_message,
        };
    }

    Error::Api {
        status,
        error_type: err.error_type,
        code: err.error_code,
        message: err.error_message,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    pub(crate) fn test_credentials() -> Credentials {
        Credentials {
            client_id: "client-123".to_string(),
            secret: "secret-456".to_string(),
            access_token: "access-sandbox-789".to_string(),
            env: Environment::Sandbox,
        }
    }

    pub(crate) fn plaid_txn(id: &str, amount: f64, date: &str, category: &[&str]) -> Value {
        json!({
            "transaction_id": id,
            "account_id": "acct-1",
            "amount": amount,
            "date": date,
            "name": format!("{} DESCRIPTION", id),
            "merchant_name": null,
            "category": category,
            "pending": false,
            "iso_currency_code": "USD",
        })
    }

    /// Serves `transactions` as `/transactions/get` pages, recording every request body.
    pub(crate) async fn serve_transactions(
        transactions: Vec<Value>,
    ) -> (String, Arc<Mutex<Vec<Value>>>) {
        let requests = Arc::new(Mutex::new(vec![]));
        let state = (Arc::new(transactions), requests.clone());

        async fn page(
            Json(req): Json<Value>,
            Extension((txns, requests)): Extension<(Arc<Vec<Value>>, Arc<Mutex<Vec<Value>>>)>,
        ) -> Json<Value> {
            let offset = req["options"]["offset"].as_u64().unwrap() as usize;
            let count = req["options"]["count"].as_u64().unwrap() as usize;
            requests.lock().unwrap().push(req);

            // Two records per page regardless of `count` to exercise paging.
            let end = (offset + count.min(2)).min(txns.len());
            Json(json!({
                "accounts": [],
                "transactions": txns[offset.min(txns.len())..end],
                "total_transactions": txns.len(),
                "request_id": "req-1",
            }))
        }

        let app = Router::new()
            .route("/transactions/get", post(page))
            .layer(Extension(state));

        (spawn(app), requests)
    }

    pub(crate) async fn serve_error(status: StatusCode, body: Value) -> String {
        let app = Router::new().route(
            "/transactions/get",
            post(move || async move { (status, Json(body)) }),
        );

        spawn(app)
    }

    fn spawn(app: Router) -> String {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = axum::Server::bind(&addr).serve(app.into_make_service());
        let addr = server.local_addr();

        tokio::spawn(async move {
            server.await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parse_environment_names() {
        assert_eq!("sandbox".parse::<Environment>().unwrap(), Environment::Sandbox);
        assert_eq!("Development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn credentials_require_all_keys() {
        let partial = Config::builder()
            .set_override("client_id", "client-123")
            .unwrap()
            .set_override("secret", "secret-456")
            .unwrap()
            .build()
            .unwrap();
        assert!(Credentials::from_config(partial).unwrap().is_none());

        let blank = Config::builder()
            .set_override("client_id", "client-123")
            .unwrap()
            .set_override("secret", "secret-456")
            .unwrap()
            .set_override("access_token", " ")
            .unwrap()
            .build()
            .unwrap();
        assert!(Credentials::from_config(blank).unwrap().is_none());
    }

    #[test]
    fn credentials_read_environment_selection() {
        let source = Config::builder()
            .set_override("client_id", "client-123")
            .unwrap()
            .set_override("secret", "secret-456")
            .unwrap()
            .set_override("access_token", "access-789")
            .unwrap()
            .set_override("env", "production")
            .unwrap()
            .build()
            .unwrap();

        let creds = Credentials::from_config(source).unwrap().unwrap();
        assert_eq!(creds.access_token, "access-789");
        assert_eq!(creds.env, Environment::Production);
    }

    #[tokio::test]
    async fn fetches_all_pages() {
        let txns = vec![
            plaid_txn("a", 10.0, "2024-03-01", &["Food and Drink", "Restaurants"]),
            plaid_txn("b", 4.5, "2024-03-02", &["Shops"]),
            plaid_txn("c", -250.0, "2024-03-03", &["Transfer", "Deposit"]),
            plaid_txn("d", 99.25, "2024-03-04", &[]),
            plaid_txn("e", 1.0, "2024-03-05", &["Travel"]),
        ];
        let (url, requests) = serve_transactions(txns).await;
        let plaid = Plaid::with_base_url(test_credentials(), &url).unwrap();

        let got = plaid
            .transactions(date("2024-02-01"), date("2024-03-07"))
            .await
            .unwrap();

        assert_eq!(got.len(), 5);
        assert_eq!(got[1].amount, dec!(4.5));
        assert_eq!(got[2].amount, dec!(-250));
        assert_eq!(got[3].category, Some(vec![]));

        let requests = requests.lock().unwrap();
        let offsets: Vec<u64> = requests
            .iter()
            .map(|r| r["options"]["offset"].as_u64().unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 2, 4]);
        assert_eq!(requests[0]["access_token"], "access-sandbox-789");
        assert_eq!(requests[0]["start_date"], "2024-02-01");
        assert_eq!(requests[0]["end_date"], "2024-03-07");
        assert_eq!(requests[0]["options"]["count"], 500);
    }

    #[tokio::test]
    async fn empty_window_makes_single_request() {
        let (url, requests) = serve_transactions(vec![]).await;
        let plaid = Plaid::with_base_url(test_credentials(), &url).unwrap();

        let got = plaid
            .transactions(date("2024-02-01"), date("2024-03-07"))
            .await
            .unwrap();

        assert!(got.is_empty());
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_token_is_an_auth_error() {
        let url = serve_error(
            StatusCode::BAD_REQUEST,
            json!({
                "error_type": "INVALID_INPUT",
                "error_code": "INVALID_ACCESS_TOKEN",
                "error_message": "provided access token is in an invalid format",
                "display_message": null,
                "request_id": "req-2",
            }),
        )
        .await;
        let plaid = Plaid::with_base_url(test_credentials(), &url).unwrap();

        let err = plaid
            .transactions(date("2024-02-01"), date("2024-03-07"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth { ref code, .. } if code == "INVALID_ACCESS_TOKEN"));
    }

    #[tokio::test]
    async fn rate_limit_is_classified() {
        let url = serve_error(
            StatusCode::TOO_MANY_REQUESTS,
            json!({
                "error_type": "RATE_LIMIT_EXCEEDED",
                "error_code": "TRANSACTIONS_LIMIT",
                "error_message": "rate limit exceeded for attempts to access this item",
            }),
        )
        .await;
        let plaid = Plaid::with_base_url(test_credentials(), &url).unwrap();

        let err = plaid
            .transactions_get(date("2024-02-01"), date("2024-03-07"), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let app = Router::new().route(
            "/transactions/get",
            post(|| async { Json(json!({ "transactions": "not a list" })) }),
        );
        let url = spawn(app);
        let plaid = Plaid::with_base_url(test_credentials(), &url).unwrap();

        let err = plaid
            .transactions_get(date("2024-02-01"), date("2024-03-07"), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn unparseable_error_body_is_kept_verbatim() {
        let err = classify_error(502, "<html>bad gateway</html>");
        assert!(err.to_string().contains("<html>bad gateway</html>"));
    }
}
