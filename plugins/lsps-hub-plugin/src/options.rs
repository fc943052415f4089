use anyhow::{anyhow, Context, Result};
use cln_plugin::options::{ConfigOption, Value};
use lsps_hub::nostr::PublicKey as NostrPublicKey;
use lsps_hub::{HubConfig, HubConfigBuilder};

pub const SUPPORTED_PROTOCOLS: &str = "lsps-hub-supported-protocols";
pub const EVENT_QUEUE_CAPACITY: &str = "lsps-hub-event-queue-capacity";
pub const NOSTR_RELAYS: &str = "lsps-hub-nostr-relays";
pub const NOSTR_TRUSTED_PUBKEYS: &str = "lsps-hub-nostr-trusted-pubkeys";
pub const NOSTR_PUBKEY: &str = "lsps-hub-nostr-pubkey";

pub fn supported_protocols() -> ConfigOption {
    ConfigOption::new(
        SUPPORTED_PROTOCOLS,
        Value::String("0,1,2".to_string()),
        "Comma-separated list of the LSPS protocols advertised in lsps0.list_protocols",
    )
}

pub fn event_queue_capacity() -> ConfigOption {
    ConfigOption::new(
        EVENT_QUEUE_CAPACITY,
        Value::Integer(100),
        "Number of LSPS1 and LSPS5 events kept until they are drained. Newer events are dropped when full",
    )
}

pub fn nostr_relays() -> ConfigOption {
    ConfigOption::new(
        NOSTR_RELAYS,
        Value::OptString,
        "Comma-separated list of Nostr relays used to receive LSPS5 notifications",
    )
}

pub fn nostr_trusted_pubkeys() -> ConfigOption {
    ConfigOption::new(
        NOSTR_TRUSTED_PUBKEYS,
        Value::OptString,
        "Comma-separated list of hex-encoded x-only Nostr keys of the LSPs whose notifications are accepted",
    )
}

pub fn nostr_pubkey() -> ConfigOption {
    ConfigOption::new(
        NOSTR_PUBKEY,
        Value::OptString,
        "The hex-encoded x-only Nostr key LSPS5 notifications are addressed to",
    )
}

/// The parsed configuration of the plugin
#[derive(Debug, Clone)]
pub struct PluginOptions {
    pub hub_config: HubConfig,
    pub trusted_pubkeys: Vec<NostrPublicKey>,
    pub nostr_pubkey: Option<NostrPublicKey>,
}

impl PluginOptions {
    /// Reads all options using `option` to look up the configured values
    pub fn from_values<F>(option: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<Value>,
    {
        let mut builder = HubConfigBuilder::new();

        if let Some(protocols) = string_option(&option, SUPPORTED_PROTOCOLS)? {
            let protocols = split_list(&protocols)
                .map(|p| {
                    p.parse::<u32>()
                        .with_context(|| format!("Invalid protocol '{}' in {}", p, SUPPORTED_PROTOCOLS))
                })
                .collect::<Result<Vec<_>>>()?;
            builder = builder.supported_protocols(protocols);
        }

        match option(EVENT_QUEUE_CAPACITY) {
            Some(Value::Integer(capacity)) => {
                let capacity = usize::try_from(capacity)
                    .with_context(|| format!("{} can't be negative", EVENT_QUEUE_CAPACITY))?;
                builder = builder.event_queue_capacity(capacity);
            }
            Some(Value::OptInteger) | None => {}
            Some(other) => {
                return Err(anyhow!(
                    "Invalid value {:?} for {}. Expected an integer",
                    other,
                    EVENT_QUEUE_CAPACITY
                ))
            }
        }

        if let Some(relays) = string_option(&option, NOSTR_RELAYS)? {
            builder = builder.nostr_relays(split_list(&relays).map(String::from).collect());
        }

        let trusted_pubkeys = match string_option(&option, NOSTR_TRUSTED_PUBKEYS)? {
            Some(keys) => split_list(&keys)
                .map(|key| parse_nostr_pubkey(key, NOSTR_TRUSTED_PUBKEYS))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let nostr_pubkey = string_option(&option, NOSTR_PUBKEY)?
            .map(|key| parse_nostr_pubkey(key.trim(), NOSTR_PUBKEY))
            .transpose()?;

        Ok(Self {
            hub_config: builder.build()?,
            trusted_pubkeys,
            nostr_pubkey,
        })
    }
}

fn string_option<F>(option: &F, name: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Option<Value>,
{
    match option(name) {
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::OptString) | None => Ok(None),
        Some(other) => Err(anyhow!(
            "Invalid value {:?} for {}. Expected a string",
            other,
            name
        )),
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_nostr_pubkey(key: &str, name: &str) -> Result<NostrPublicKey> {
    NostrPublicKey::from_hex(key).with_context(|| format!("Invalid nostr key '{}' in {}", key, name))
}

#[cfg(test)]
mod test {
    use super::*;
    use lsps_hub::nostr::Keys;
    use std::collections::HashMap;

    fn lookup(values: Vec<(&'static str, Value)>) -> impl Fn(&str) -> Option<Value> {
        let values: HashMap<&str, Value> = values.into_iter().collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_configured() {
        let options = PluginOptions::from_values(|_| None).unwrap();
        assert_eq!(options.hub_config, HubConfig::default());
        assert!(options.trusted_pubkeys.is_empty());
        assert!(options.nostr_pubkey.is_none());
    }

    #[test]
    fn parses_lists() {
        let lsp = Keys::generate().public_key();
        let local = Keys::generate().public_key();

        let options = PluginOptions::from_values(lookup(vec![
            (SUPPORTED_PROTOCOLS, Value::String("0, 1,5".to_string())),
            (EVENT_QUEUE_CAPACITY, Value::Integer(10)),
            (
                NOSTR_RELAYS,
                Value::String("wss://relay.one, wss://relay.two,".to_string()),
            ),
            (NOSTR_TRUSTED_PUBKEYS, Value::String(lsp.to_hex())),
            (NOSTR_PUBKEY, Value::String(local.to_hex())),
        ]))
        .unwrap();

        assert_eq!(options.hub_config.supported_protocols, vec![0, 1, 5]);
        assert_eq!(options.hub_config.event_queue_capacity, 10);
        assert_eq!(
            options.hub_config.nostr_relays,
            vec!["wss://relay.one".to_string(), "wss://relay.two".to_string()]
        );
        assert_eq!(options.trusted_pubkeys, vec![lsp]);
        assert_eq!(options.nostr_pubkey, Some(local));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(PluginOptions::from_values(lookup(vec![(
            SUPPORTED_PROTOCOLS,
            Value::String("0,one".to_string())
        )]))
        .is_err());

        assert!(PluginOptions::from_values(lookup(vec![(
            EVENT_QUEUE_CAPACITY,
            Value::Integer(0)
        )]))
        .is_err());

        assert!(PluginOptions::from_values(lookup(vec![(
            EVENT_QUEUE_CAPACITY,
            Value::Integer(-3)
        )]))
        .is_err());

        assert!(PluginOptions::from_values(lookup(vec![(
            NOSTR_TRUSTED_PUBKEYS,
            Value::String("not-a-key".to_string())
        )]))
        .is_err());
    }
}
