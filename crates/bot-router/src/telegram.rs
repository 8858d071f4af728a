use async_trait::async_trait;
use pricewatch_core::{ForecastResult, PriceWatchError, PriceWatchResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::registry::BotTransport;

/// Token slots read from the environment.
pub const MAX_BOTS: usize = 4;
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub tokens: Vec<String>,
    pub chat_id: String,
    pub api_base: String,
    /// Forecast backend the bots relay `/analyze` to.
    pub backend_url: String,
    pub timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            chat_id: "@self".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            backend_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TelegramConfig {
    /// Reads `TELEGRAM_BOT_TOKEN_1` through `TELEGRAM_BOT_TOKEN_4`; empty or
    /// missing slots are skipped.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let tokens = (1..=MAX_BOTS)
            .filter_map(|i| env::var(format!("TELEGRAM_BOT_TOKEN_{i}")).ok())
            .filter(|t| !t.trim().is_empty())
            .collect();

        Self {
            tokens,
            chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or(defaults.chat_id),
            api_base: env::var("TELEGRAM_API_BASE").unwrap_or(defaults.api_base),
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            timeout: defaults.timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct DirectAlertRequest<'a> {
    product_url: &'a str,
    target_price: f64,
    user_id: &'a str,
}

/// Only the envelope matters; the stored alert itself is not needed here.
#[derive(Debug, Deserialize)]
struct DirectAlertResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    product_name: &'a str,
    current_price: f64,
    product_url: &'a str,
}

/// One Telegram bot identity talking to the Bot API over HTTPS.
pub struct TelegramBot {
    name: String,
    client: reqwest::Client,
    api_url: String,
    chat_id: String,
    backend_url: String,
}

impl TelegramBot {
    pub fn new(slot: usize, token: &str, config: &TelegramConfig) -> PriceWatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PriceWatchError::Config(format!("telegram http client: {e}")))?;

        Ok(Self {
            name: format!("telegram-{slot}"),
            client,
            api_url: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
            chat_id: config.chat_id.clone(),
            backend_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    /// Every configured token as a bot, slots numbered from 1.
    pub fn from_config(config: &TelegramConfig) -> PriceWatchResult<Vec<Self>> {
        config
            .tokens
            .iter()
            .enumerate()
            .map(|(i, token)| Self::new(i + 1, token, config))
            .collect()
    }

    async fn call<T, B>(&self, method: &str, body: Option<&B>) -> PriceWatchResult<T>
    where
        T: for<'de> Deserialize<'de>,
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.api_url, method);
        let request = match body {
            Some(b) => self.client.post(&url).json(b),
            None => self.client.get(&url),
        };

        // Errors are stripped of the URL so the token never reaches the logs.
        let response: ApiResponse<T> = request
            .send()
            .await
            .map_err(|e| PriceWatchError::Transport(format!("{method}: {}", e.without_url())))?
            .json()
            .await
            .map_err(|e| PriceWatchError::Transport(format!("{method}: {}", e.without_url())))?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(PriceWatchError::Transport(format!(
                "{method} rejected: {}",
                response.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    async fn send_message(&self, text: &str) -> PriceWatchResult<()> {
        let _: serde_json::Value = self
            .call("sendMessage", Some(&SendMessage { chat_id: &self.chat_id, text }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BotTransport for TelegramBot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self) -> PriceWatchResult<()> {
        let me: BotUser = self.call::<BotUser, ()>("getMe", None).await?;
        tracing::info!(bot = %self.name, username = ?me.username, "Bot reachable");
        Ok(())
    }

    /// Posts `/analyze <url>` to the chat, then fetches the forecast from the
    /// backend the bot relays to.
    async fn request_analysis(
        &self,
        product_url: &str,
        product_name: &str,
        current_price: f64,
    ) -> PriceWatchResult<Option<ForecastResult>> {
        self.send_message(&format!("/analyze {product_url}")).await?;

        let response = self
            .client
            .post(format!("{}/predict", self.backend_url))
            .json(&PredictRequest { product_name, current_price, product_url })
            .send()
            .await
            .map_err(|e| PriceWatchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(bot = %self.name, status = %response.status(), "Backend predict failed");
            return Ok(None);
        }
        let result = response
            .json::<ForecastResult>()
            .await
            .map_err(|e| PriceWatchError::Transport(e.to_string()))?;
        Ok(Some(result))
    }

    /// Posts `/alert <url> <target> <user>` to the chat, then has the backend
    /// persist the alert. Accepted only once the backend confirms the write.
    async fn request_alert(
        &self,
        product_url: &str,
        target_price: f64,
        user: &str,
    ) -> PriceWatchResult<bool> {
        self.send_message(&format!("/alert {product_url} {target_price} {user}"))
            .await?;

        let response = self
            .client
            .post(format!("{}/alerts/direct", self.backend_url))
            .json(&DirectAlertRequest { product_url, target_price, user_id: user })
            .send()
            .await
            .map_err(|e| PriceWatchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(bot = %self.name, status = %response.status(), "Backend alert create failed");
            return Ok(false);
        }
        let body = response
            .json::<DirectAlertResponse>()
            .await
            .map_err(|e| PriceWatchError::Transport(e.to_string()))?;

        tracing::info!(bot = %self.name, user, accepted = body.success, "Alert request relayed");
        Ok(body.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_bots_numbered_by_slot() {
        let config = TelegramConfig {
            tokens: vec!["111:AAA".to_string(), "222:BBB".to_string()],
            api_base: "https://api.telegram.org/".to_string(),
            ..TelegramConfig::default()
        };
        let bots = TelegramBot::from_config(&config).unwrap();
        assert_eq!(bots.len(), 2);
        assert_eq!(bots[0].name(), "telegram-1");
        assert_eq!(bots[1].api_url, "https://api.telegram.org/bot222:BBB");
    }

    #[test]
    fn test_api_response_envelope() {
        let ok: ApiResponse<BotUser> =
            serde_json::from_str(r#"{"ok":true,"result":{"id":1,"is_bot":true,"username":"pw_bot"}}"#)
                .unwrap();
        assert!(ok.ok);
        assert_eq!(ok.result.unwrap().username.as_deref(), Some("pw_bot"));

        let denied: ApiResponse<BotUser> =
            serde_json::from_str(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
                .unwrap();
        assert!(!denied.ok);
        assert_eq!(denied.description.as_deref(), Some("Unauthorized"));
    }

    /// Local stand-in for both the Bot API and the backend, recording what the
    /// bot sends.
    #[derive(Clone, Default)]
    struct Recorded {
        messages: Arc<Mutex<Vec<String>>>,
        alerts: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    async fn fake_backend(accept: bool) -> (String, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route(
                "/botT/sendMessage",
                post(|State(r): State<Recorded>, Json(body): Json<serde_json::Value>| async move {
                    let text = body["text"].as_str().unwrap_or_default().to_string();
                    r.messages.lock().unwrap().push(text);
                    Json(json!({ "ok": true, "result": { "message_id": 1 } }))
                }),
            )
            .route(
                "/alerts/direct",
                post(move |State(r): State<Recorded>, Json(body): Json<serde_json::Value>| async move {
                    r.alerts.lock().unwrap().push(body);
                    if accept {
                        (StatusCode::OK, Json(json!({ "success": true, "data": {} })))
                    } else {
                        (StatusCode::NOT_FOUND, Json(json!({ "success": false })))
                    }
                }),
            )
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), recorded)
    }

    fn bot_for(base: &str) -> TelegramBot {
        let config = TelegramConfig {
            tokens: vec!["T".to_string()],
            api_base: base.to_string(),
            backend_url: base.to_string(),
            ..TelegramConfig::default()
        };
        TelegramBot::new(1, "T", &config).unwrap()
    }

    #[tokio::test]
    async fn test_alert_relay_carries_user_and_waits_for_backend() {
        let (base, recorded) = fake_backend(true).await;
        let bot = bot_for(&base);

        let accepted = bot
            .request_alert("https://www.amazon.in/dp/B08TV2P1N8", 277.0, "priya@example.com")
            .await
            .unwrap();
        assert!(accepted);

        let messages = recorded.messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].ends_with("priya@example.com"));

        let alerts = recorded.alerts.lock().unwrap().clone();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["user_id"], "priya@example.com");
        assert_eq!(alerts[0]["target_price"], 277.0);
        assert_eq!(alerts[0]["product_url"], "https://www.amazon.in/dp/B08TV2P1N8");
    }

    #[tokio::test]
    async fn test_alert_relay_rejected_by_backend_is_not_accepted() {
        let (base, recorded) = fake_backend(false).await;
        let bot = bot_for(&base);

        let accepted = bot
            .request_alert("https://x/p", 250.0, "priya@example.com")
            .await
            .unwrap();
        assert!(!accepted);
        assert_eq!(recorded.alerts.lock().unwrap().len(), 1);
    }
}
