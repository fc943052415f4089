use anyhow::{Context, Result};

use crate::lsps0::common_schemas::LokiAmount;
use crate::lsps1::schema::{Lsps1CreateOrderRequest, Lsps1OrderParams, Lsps1Options};

#[derive(Default, Debug, Clone)]
pub struct Lsps1OptionsBuilder {
    min_required_channel_confirmations: Option<u16>,
    min_funding_confirms_within_blocks: Option<u16>,
    min_onchain_payment_confirmations: Option<u16>,
    supports_zero_channel_reserve: Option<bool>,
    min_onchain_payment_size_loki: Option<LokiAmount>,
    max_channel_expiry_blocks: Option<u32>,
    min_initial_client_balance_loki: Option<LokiAmount>,
    max_initial_client_balance_loki: Option<LokiAmount>,
    min_initial_lsp_balance_loki: Option<LokiAmount>,
    max_initial_lsp_balance_loki: Option<LokiAmount>,
    min_channel_balance_loki: Option<LokiAmount>,
    max_channel_balance_loki: Option<LokiAmount>,
}

impl Lsps1OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_required_channel_confirmations(mut self, value: u16) -> Self {
        self.min_required_channel_confirmations = Some(value);
        self
    }

    pub fn min_funding_confirms_within_blocks(mut self, value: u16) -> Self {
        self.min_funding_confirms_within_blocks = Some(value);
        self
    }

    pub fn min_onchain_payment_confirmations(mut self, value: Option<u16>) -> Self {
        self.min_onchain_payment_confirmations = value;
        self
    }

    pub fn supports_zero_channel_reserve(mut self, value: bool) -> Self {
        self.supports_zero_channel_reserve = Some(value);
        self
    }

    pub fn min_onchain_payment_size_loki(mut self, value: Option<LokiAmount>) -> Self {
        self.min_onchain_payment_size_loki = value;
        self
    }

    pub fn max_channel_expiry_blocks(mut self, value: u32) -> Self {
        self.max_channel_expiry_blocks = Some(value);
        self
    }

    pub fn min_initial_client_balance_loki(mut self, value: LokiAmount) -> Self {
        self.min_initial_client_balance_loki = Some(value);
        self
    }

    pub fn max_initial_client_balance_loki(mut self, value: LokiAmount) -> Self {
        self.max_initial_client_balance_loki = Some(value);
        self
    }

    pub fn min_initial_lsp_balance_loki(mut self, value: LokiAmount) -> Self {
        self.min_initial_lsp_balance_loki = Some(value);
        self
    }

    pub fn max_initial_lsp_balance_loki(mut self, value: LokiAmount) -> Self {
        self.max_initial_lsp_balance_loki = Some(value);
        self
    }

    pub fn min_channel_balance_loki(mut self, value: LokiAmount) -> Self {
        self.min_channel_balance_loki = Some(value);
        self
    }

    pub fn max_channel_balance_loki(mut self, value: LokiAmount) -> Self {
        self.max_channel_balance_loki = Some(value);
        self
    }

    pub fn build(self) -> Result<Lsps1Options> {
        Ok(Lsps1Options {
            min_required_channel_confirmations: self
                .min_required_channel_confirmations
                .context("Missing field 'min_required_channel_confirmations'")?,
            min_funding_confirms_within_blocks: self
                .min_funding_confirms_within_blocks
                .context("Missing field 'min_funding_confirms_within_blocks'")?,
            min_onchain_payment_confirmations: self.min_onchain_payment_confirmations,
            supports_zero_channel_reserve: self
                .supports_zero_channel_reserve
                .context("Missing field 'supports_zero_channel_reserve'")?,
            min_onchain_payment_size_loki: self.min_onchain_payment_size_loki,
            max_channel_expiry_blocks: self
                .max_channel_expiry_blocks
                .context("Missing field 'max_channel_expiry_blocks'")?,
            min_initial_client_balance_loki: self
                .min_initial_client_balance_loki
                .context("Missing field 'min_initial_client_balance_loki'")?,
            max_initial_client_balance_loki: self
                .max_initial_client_balance_loki
                .context("Missing field 'max_initial_client_balance_loki'")?,
            min_initial_lsp_balance_loki: self
                .min_initial_lsp_balance_loki
                .context("Missing field 'min_initial_lsp_balance_loki'")?,
            max_initial_lsp_balance_loki: self
                .max_initial_lsp_balance_loki
                .context("Missing field 'max_initial_lsp_balance_loki'")?,
            min_channel_balance_loki: self
                .min_channel_balance_loki
                .context("Missing field 'min_channel_balance_loki'")?,
            max_channel_balance_loki: self
                .max_channel_balance_loki
                .context("Missing field 'max_channel_balance_loki'")?,
        })
    }
}

#[derive(Default, Debug, Clone)]
pub struct Lsps1OrderParamsBuilder {
    lsp_balance_loki: Option<LokiAmount>,
    client_balance_loki: Option<LokiAmount>,
    required_channel_confirmations: Option<u16>,
    funding_confirms_within_blocks: Option<u16>,
    channel_expiry_blocks: Option<u32>,
    token: Option<String>,
    announce_channel: Option<bool>,
}

impl Lsps1OrderParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lsp_balance_loki(mut self, value: LokiAmount) -> Self {
        self.lsp_balance_loki = Some(value);
        self
    }

    pub fn client_balance_loki(mut self, value: LokiAmount) -> Self {
        self.client_balance_loki = Some(value);
        self
    }

    pub fn required_channel_confirmations(mut self, value: u16) -> Self {
        self.required_channel_confirmations = Some(value);
        self
    }

    pub fn funding_confirms_within_blocks(mut self, value: u16) -> Self {
        self.funding_confirms_within_blocks = Some(value);
        self
    }

    pub fn channel_expiry_blocks(mut self, value: u32) -> Self {
        self.channel_expiry_blocks = Some(value);
        self
    }

    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn announce_channel(mut self, value: bool) -> Self {
        self.announce_channel = Some(value);
        self
    }

    pub fn build(self) -> Result<Lsps1OrderParams> {
        Ok(Lsps1OrderParams {
            lsp_balance_loki: self
                .lsp_balance_loki
                .context("Missing field 'lsp_balance_loki'")?,
            client_balance_loki: self.client_balance_loki.unwrap_or_default(),
            required_channel_confirmations: self
                .required_channel_confirmations
                .context("Missing field 'required_channel_confirmations'")?,
            funding_confirms_within_blocks: self
                .funding_confirms_within_blocks
                .context("Missing field 'funding_confirms_within_blocks'")?,
            channel_expiry_blocks: self
                .channel_expiry_blocks
                .context("Missing field 'channel_expiry_blocks'")?,
            token: self.token,
            announce_channel: self.announce_channel.unwrap_or(false),
        })
    }

    /// Builds the params of `lsps1.create_order`
    pub fn build_request(self, refund_onchain_address: Option<String>) -> Result<Lsps1CreateOrderRequest> {
        Ok(Lsps1CreateOrderRequest {
            order: self.build()?,
            refund_onchain_address,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_fields_are_reported() {
        let err = Lsps1OrderParamsBuilder::new()
            .client_balance_loki(LokiAmount::new(1))
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing field 'lsp_balance_loki'");
    }

    #[test]
    fn optional_order_fields_have_defaults() {
        let order = Lsps1OrderParamsBuilder::new()
            .lsp_balance_loki(LokiAmount::new(100_000))
            .required_channel_confirmations(0)
            .funding_confirms_within_blocks(6)
            .channel_expiry_blocks(144)
            .build()
            .unwrap();

        assert_eq!(order.client_balance_loki, LokiAmount::new(0));
        assert!(!order.announce_channel);
        assert!(order.token.is_none());
    }
}
