use crate::json_rpc::error::codes;
use crate::json_rpc::ErrorData;
use crate::lsps1::schema::{Lsps1OrderParams, Lsps1Options};

use serde::{Deserialize, Serialize};

/// The order violates one of the options advertised by the LSP
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lsps1OptionMismatchError {
    pub property: String,
    pub message: String,
}

impl Lsps1OptionMismatchError {
    fn new(property: &str, message: String) -> Self {
        Self {
            property: property.to_string(),
            message,
        }
    }
}

impl From<Lsps1OptionMismatchError> for ErrorData {
    fn from(value: Lsps1OptionMismatchError) -> Self {
        let data = serde_json::json!({
            "property" : value.property,
            "message" : value.message,
        });
        ErrorData {
            code: codes::LSPS1_OPTION_MISMATCH_CODE,
            message: "option_mismatch".to_string(),
            data: Some(data),
        }
    }
}

impl Lsps1OrderParams {
    /// Checks the order against the options of the LSP.
    ///
    /// Reports the first option that is violated.
    pub fn validate_options(&self, options: &Lsps1Options) -> Result<(), Lsps1OptionMismatchError> {
        if self.client_balance_loki < options.min_initial_client_balance_loki {
            return Err(Lsps1OptionMismatchError::new(
                "min_initial_client_balance_loki",
                format!(
                    "Requested client_balance_loki={} but the LSP requires at least {}",
                    self.client_balance_loki, options.min_initial_client_balance_loki
                ),
            ));
        }

        if self.client_balance_loki > options.max_initial_client_balance_loki {
            return Err(Lsps1OptionMismatchError::new(
                "max_initial_client_balance_loki",
                format!(
                    "Requested client_balance_loki={} but the LSP allows at most {}",
                    self.client_balance_loki, options.max_initial_client_balance_loki
                ),
            ));
        }

        if self.lsp_balance_loki < options.min_initial_lsp_balance_loki {
            return Err(Lsps1OptionMismatchError::new(
                "min_initial_lsp_balance_loki",
                format!(
                    "Requested lsp_balance_loki={} but the LSP requires at least {}",
                    self.lsp_balance_loki, options.min_initial_lsp_balance_loki
                ),
            ));
        }

        if self.lsp_balance_loki > options.max_initial_lsp_balance_loki {
            return Err(Lsps1OptionMismatchError::new(
                "max_initial_lsp_balance_loki",
                format!(
                    "Requested lsp_balance_loki={} but the LSP allows at most {}",
                    self.lsp_balance_loki, options.max_initial_lsp_balance_loki
                ),
            ));
        }

        // checked_add returns None on overflow
        let capacity = self
            .lsp_balance_loki
            .checked_add(&self.client_balance_loki)
            .ok_or_else(|| {
                Lsps1OptionMismatchError::new(
                    "max_channel_balance_loki",
                    "Overflow when computing the channel capacity".to_string(),
                )
            })?;

        if capacity < options.min_channel_balance_loki {
            return Err(Lsps1OptionMismatchError::new(
                "min_channel_balance_loki",
                format!(
                    "Requested a channel with capacity={} but the LSP requires at least {}",
                    capacity, options.min_channel_balance_loki
                ),
            ));
        }

        if capacity > options.max_channel_balance_loki {
            return Err(Lsps1OptionMismatchError::new(
                "max_channel_balance_loki",
                format!(
                    "Requested a channel with capacity={} but the LSP allows at most {}",
                    capacity, options.max_channel_balance_loki
                ),
            ));
        }

        if self.channel_expiry_blocks > options.max_channel_expiry_blocks {
            return Err(Lsps1OptionMismatchError::new(
                "max_channel_expiry_blocks",
                format!(
                    "Requested channel_expiry_blocks={} but the LSP allows at most {}",
                    self.channel_expiry_blocks, options.max_channel_expiry_blocks
                ),
            ));
        }

        if self.required_channel_confirmations < options.min_required_channel_confirmations {
            return Err(Lsps1OptionMismatchError::new(
                "min_required_channel_confirmations",
                format!(
                    "Requested required_channel_confirmations={} but the LSP requires at least {}",
                    self.required_channel_confirmations,
                    options.min_required_channel_confirmations
                ),
            ));
        }

        if self.funding_confirms_within_blocks < options.min_funding_confirms_within_blocks {
            return Err(Lsps1OptionMismatchError::new(
                "min_funding_confirms_within_blocks",
                format!(
                    "Requested funding_confirms_within_blocks={} but the LSP requires at least {}",
                    self.funding_confirms_within_blocks, options.min_funding_confirms_within_blocks
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use crate::lsps0::common_schemas::LokiAmount;
    use crate::lsps1::builders::{Lsps1OptionsBuilder, Lsps1OrderParamsBuilder};

    fn get_options_builder() -> Lsps1OptionsBuilder {
        Lsps1OptionsBuilder::new()
            .min_required_channel_confirmations(0)
            .min_funding_confirms_within_blocks(6)
            .supports_zero_channel_reserve(true)
            .max_channel_expiry_blocks(1_000)
            .min_initial_client_balance_loki(LokiAmount::new(0))
            .max_initial_client_balance_loki(LokiAmount::new(0))
            .min_initial_lsp_balance_loki(LokiAmount::new(100_000))
            .max_initial_lsp_balance_loki(LokiAmount::new(100_000_000))
            .min_channel_balance_loki(LokiAmount::new(100_000))
            .max_channel_balance_loki(LokiAmount::new(100_000_000))
    }

    fn get_order_builder() -> Lsps1OrderParamsBuilder {
        Lsps1OrderParamsBuilder::new()
            .client_balance_loki(LokiAmount::new(0))
            .lsp_balance_loki(LokiAmount::new(500_000))
            .required_channel_confirmations(0)
            .funding_confirms_within_blocks(6)
            .channel_expiry_blocks(1_000)
            .announce_channel(false)
    }

    #[test]
    fn test_validate_order_against_options_okay() {
        let options = get_options_builder().build().unwrap();
        let order = get_order_builder().build().unwrap();

        order.validate_options(&options).unwrap();
    }

    #[test]
    fn test_validate_order_against_options_lsp_balance_error() {
        let options = get_options_builder()
            .min_initial_lsp_balance_loki(LokiAmount::new(1_000))
            .max_initial_lsp_balance_loki(LokiAmount::new(100_000))
            .build()
            .unwrap();

        let order_1 = get_order_builder()
            .lsp_balance_loki(LokiAmount::new(0))
            .build()
            .unwrap();

        let order_2 = get_order_builder()
            .lsp_balance_loki(LokiAmount::new(999_999))
            .build()
            .unwrap();

        let err1 = order_1.validate_options(&options).unwrap_err();
        let err2 = order_2.validate_options(&options).unwrap_err();

        assert_eq!(err1.property, "min_initial_lsp_balance_loki");
        assert_eq!(err2.property, "max_initial_lsp_balance_loki");
    }

    #[test]
    fn test_validate_order_against_capacity_from_options_error() {
        let options = get_options_builder()
            .min_initial_client_balance_loki(LokiAmount::new(1_000))
            .max_initial_client_balance_loki(LokiAmount::new(100_000))
            .min_initial_lsp_balance_loki(LokiAmount::new(1_000))
            .max_initial_lsp_balance_loki(LokiAmount::new(100_000))
            .min_channel_balance_loki(LokiAmount::new(10_000))
            .max_channel_balance_loki(LokiAmount::new(100_000))
            .build()
            .unwrap();

        let order_1 = get_order_builder()
            .client_balance_loki(LokiAmount::new(1_000))
            .lsp_balance_loki(LokiAmount::new(1_000))
            .build()
            .unwrap();

        let order_2 = get_order_builder()
            .client_balance_loki(LokiAmount::new(100_000))
            .lsp_balance_loki(LokiAmount::new(100_000))
            .build()
            .unwrap();

        let err1 = order_1.validate_options(&options).unwrap_err();
        let err2 = order_2.validate_options(&options).unwrap_err();

        assert_eq!(err1.property, "min_channel_balance_loki");
        assert_eq!(err2.property, "max_channel_balance_loki");
    }

    #[test]
    fn test_validate_expiry_and_confirmations() {
        let options = get_options_builder().build().unwrap();

        let too_long = get_order_builder().channel_expiry_blocks(1_001).build().unwrap();
        let too_fast = get_order_builder()
            .funding_confirms_within_blocks(1)
            .build()
            .unwrap();

        assert_eq!(
            too_long.validate_options(&options).unwrap_err().property,
            "max_channel_expiry_blocks"
        );
        assert_eq!(
            too_fast.validate_options(&options).unwrap_err().property,
            "min_funding_confirms_within_blocks"
        );
    }

    #[test]
    fn mismatch_converts_to_option_mismatch_error() {
        let options = get_options_builder().build().unwrap();
        let order = get_order_builder().channel_expiry_blocks(5_000).build().unwrap();

        let error: crate::json_rpc::ErrorData = order.validate_options(&options).unwrap_err().into();
        assert_eq!(error.code, 2);
        assert_eq!(error.data.unwrap()["property"], "max_channel_expiry_blocks");
    }
}
