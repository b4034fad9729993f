//! Tradovate REST API client.

use crate::broker::contract::{select_front_month, ContractCache};
use crate::broker::session::{AccessToken, AuthContext, Session};
use crate::broker::types::*;
use crate::config::TradovateConfig;
use crate::error::{BridgeError, Result};
use crate::utils::{has_contract_month, normalize_symbol};
use anyhow::Context;
use chrono::{Duration, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Result of a single market order.
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    pub contract_id: i64,
    /// Raw broker response
    pub response: Value,
}

/// Result of flattening one side of the book.
#[derive(Debug, Clone, Default)]
pub struct FlattenOutcome {
    pub count: usize,
    /// Raw broker response per closing order
    pub results: Vec<Value>,
}

/// Tradovate client owning the login session and contract caches.
pub struct BrokerClient {
    http: Client,
    base_url: String,
    config: TradovateConfig,
    /// Renewal lock: held across the login call
    session: Mutex<Session>,
    contracts: RwLock<ContractCache>,
}

impl BrokerClient {
    /// Create a new client from configuration.
    pub fn new(config: &TradovateConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.host.trim_end_matches('/').to_string(),
            config: config.clone(),
            session: Mutex::new(Session::new(config.account_id)),
            contracts: RwLock::new(ContractCache::default()),
        })
    }

    /// Configured API base URL.
    pub fn host(&self) -> &str {
        &self.base_url
    }

    // ==================== Session ====================

    /// Return a usable token and account, logging in when needed.
    ///
    /// A cached token is reused until it is within 60 seconds of expiry.
    #[instrument(skip(self))]
    pub async fn ensure_token(&self) -> Result<AuthContext> {
        let mut session = self.session.lock().await;
        let now = Utc::now();

        let token = match session.valid_token(now) {
            Some(token) => token.to_string(),
            None => {
                let token = self.login(now).await?;
                let value = token.value.clone();
                session.token = Some(token);
                value
            }
        };

        let account_id = match session.account_id {
            Some(id) => id,
            None => {
                let id = self.first_account_id(&token).await?;
                session.account_id = Some(id);
                id
            }
        };

        Ok(AuthContext { token, account_id })
    }

    async fn login(&self, now: chrono::DateTime<Utc>) -> Result<AccessToken> {
        let (name, password) = match (&self.config.username, &self.config.password) {
            (Some(name), Some(password)) if !name.is_empty() && !password.is_empty() => {
                (name.clone(), password.clone())
            }
            _ => {
                return Err(BridgeError::Configuration(
                    "Tradovate username and password are not configured".to_string(),
                ))
            }
        };

        let request = AccessTokenRequest {
            name,
            password,
            app_id: self.config.app_id.clone(),
            app_version: self.config.app_version.clone(),
            cid: self.config.cid.clone(),
            device_id: self.config.device_id.clone(),
            sec: self.config.sec.clone(),
        };

        debug!(app_id = %request.app_id, "Requesting access token");
        let response: AccessTokenResponse =
            self.post("/auth/accesstokenrequest", None, &request).await?;

        let value = response.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            BridgeError::Configuration(format!(
                "login refused: {}",
                response
                    .error_text
                    .as_deref()
                    .unwrap_or("response did not include an access token")
            ))
        })?;

        // Tradovate never issues tokens that outlive a day
        let lifetime = self.config.token_lifetime_secs.min(24 * 3600) as i64;
        let expires_at = response
            .expiration_time
            .unwrap_or_else(|| now + Duration::seconds(lifetime));

        info!(%expires_at, "Obtained Tradovate access token");
        Ok(AccessToken::new(value, expires_at))
    }

    async fn first_account_id(&self, token: &str) -> Result<i64> {
        let accounts: Vec<Account> = self.get("/account/list", token).await?;
        let account = accounts.first().ok_or_else(|| {
            BridgeError::Configuration("no Tradovate account available".to_string())
        })?;

        info!(
            account_id = account.id,
            name = account.name.as_deref().unwrap_or("-"),
            "Using default account"
        );
        Ok(account.id)
    }

    // ==================== Contracts ====================

    /// Resolve a symbol to a Tradovate contract id.
    ///
    /// Symbols with a digit (`ESZ4`) are looked up directly. Bare roots
    /// (`ES`) resolve to the front month.
    #[instrument(skip(self))]
    pub async fn resolve_contract_id(&self, instrument: &str) -> Result<i64> {
        let auth = self.ensure_token().await?;
        self.resolve_with(&auth, instrument).await
    }

    async fn resolve_with(&self, auth: &AuthContext, instrument: &str) -> Result<i64> {
        let symbol = normalize_symbol(instrument);
        if symbol.is_empty() {
            return Err(BridgeError::Validation("instrument is required".to_string()));
        }

        if has_contract_month(&symbol) {
            self.resolve_explicit(auth, &symbol).await
        } else {
            self.resolve_front_month(auth, &symbol).await
        }
    }

    async fn resolve_explicit(&self, auth: &AuthContext, symbol: &str) -> Result<i64> {
        if let Some(id) = self.contracts.read().await.symbol(symbol) {
            return Ok(id);
        }

        let path = format!("/contract/find?name={}", urlencoding::encode(symbol));
        let found: Option<OneOrMany<Contract>> = self.get(&path, &auth.token).await?;
        let contracts = found.map(OneOrMany::into_vec).unwrap_or_default();

        let id = contracts
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(symbol))
            .or_else(|| contracts.first())
            .and_then(|c| c.id)
            .ok_or_else(|| BridgeError::Validation(format!("no contract found for {}", symbol)))?;

        self.contracts.write().await.insert_symbol(symbol, id);
        info!(%symbol, contract_id = id, "Resolved contract");
        Ok(id)
    }

    async fn resolve_front_month(&self, auth: &AuthContext, root: &str) -> Result<i64> {
        let now = Utc::now();
        if let Some(id) = self.contracts.read().await.root(root, now).and_then(|c| c.id) {
            return Ok(id);
        }

        let path = format!(
            "/contract/suggest?t={}&l={}",
            urlencoding::encode(root),
            self.config.suggest_limit
        );
        let found: Option<OneOrMany<Contract>> = self.get(&path, &auth.token).await?;
        let contracts = found.map(OneOrMany::into_vec).unwrap_or_default();

        let (chosen, in_future) = select_front_month(&contracts, root, now)
            .ok_or_else(|| BridgeError::Validation(format!("no contracts found for {}", root)))?;

        if !in_future {
            warn!(
                %root,
                contract = %chosen.name,
                "No future-dated contract found, falling back to first result"
            );
        }

        let id = chosen.id.ok_or_else(|| {
            BridgeError::Validation(format!("contract {} has no id", chosen.name))
        })?;

        info!(%root, contract = %chosen.name, contract_id = id, "Resolved front month");
        self.contracts.write().await.insert_root(root, chosen.clone());
        Ok(id)
    }

    // ==================== Orders ====================

    /// Place a market order on the contract `instrument` resolves to.
    #[instrument(skip(self))]
    pub async fn place_market(
        &self,
        instrument: &str,
        qty: i64,
        action: OrderAction,
    ) -> Result<OrderPlacement> {
        let auth = self.ensure_token().await?;
        let contract_id = self.resolve_with(&auth, instrument).await?;
        let response = self.submit_market(&auth, contract_id, action, qty).await?;

        Ok(OrderPlacement {
            contract_id,
            response,
        })
    }

    async fn submit_market(
        &self,
        auth: &AuthContext,
        contract_id: i64,
        action: OrderAction,
        qty: i64,
    ) -> Result<Value> {
        let order = PlaceOrderRequest::market(auth.account_id, contract_id, action, qty);
        info!(
            account_id = auth.account_id,
            contract_id,
            %action,
            qty,
            "Placing market order"
        );

        self.post("/order/placeorder", Some(&auth.token), &order).await
    }

    /// Open positions on the session account.
    #[instrument(skip(self))]
    pub async fn positions(&self) -> Result<Vec<Position>> {
        let auth = self.ensure_token().await?;
        self.list_positions(&auth).await
    }

    async fn list_positions(&self, auth: &AuthContext) -> Result<Vec<Position>> {
        let positions: Vec<Position> = self.get("/position/list", &auth.token).await?;
        let positions: Vec<Position> = positions
            .into_iter()
            .filter(|p| p.account_id == auth.account_id)
            .collect();

        debug!(count = positions.len(), "Fetched positions");
        Ok(positions)
    }

    /// Close every position on `side`, optionally only on one instrument.
    ///
    /// One offsetting market order is sent per matching position, sized to
    /// its absolute net quantity.
    #[instrument(skip(self))]
    pub async fn flatten_side(
        &self,
        side: PositionSide,
        instrument: Option<&str>,
    ) -> Result<FlattenOutcome> {
        let auth = self.ensure_token().await?;
        let positions = self.list_positions(&auth).await?;

        let contract_filter = match instrument {
            Some(instrument) => Some(self.resolve_with(&auth, instrument).await?),
            None => None,
        };

        let mut outcome = FlattenOutcome::default();
        for position in positions {
            if contract_filter.is_some_and(|id| id != position.contract_id) {
                continue;
            }

            let Some((action, qty)) = side.closing_order(position.net_pos) else {
                continue;
            };

            let response = self
                .submit_market(&auth, position.contract_id, action, qty)
                .await?;
            info!(
                contract_id = position.contract_id,
                %action,
                qty,
                closed = outcome.count + 1,
                "Closed position"
            );
            outcome.results.push(response);
            outcome.count += 1;
        }

        info!(%side, count = outcome.count, "Flattened positions");
        Ok(outcome)
    }

    // ==================== Transport ====================

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        Self::read_response(response).await
    }

    async fn post<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        Self::read_response(response).await
    }

    async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "Tradovate API error");
            return Err(BridgeError::Broker {
                status: status.as_u16(),
                body: serde_json::from_str(&text).ok(),
                text,
            });
        }

        Ok(response.json().await?)
    }
}
