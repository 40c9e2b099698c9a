use crate::chain::{AnswerUpdate, ChainError};
use web3::ethabi::{self, Event, RawLog, Token};
use web3::transports::WebSocket;
use web3::{
    contract::Contract,
    types::{Address, H256, U256},
};

/// The part of the price feed proxy ABI the monitor uses.
pub const PROXY_ABI: &str = r#" [
    {
        "inputs": [],
        "name": "aggregator",
        "outputs": [
            {
                "internalType": "address",
                "name": "",
                "type": "address"
            }
        ],
        "stateMutability": "view",
        "type": "function"
    }
]"#;

/// The part of the aggregator ABI the monitor uses.
pub const AGGREGATOR_ABI: &str = r#" [
    {
        "anonymous": false,
        "inputs": [
            {
                "indexed": true,
                "internalType": "int256",
                "name": "current",
                "type": "int256"
            },
            {
                "indexed": true,
                "internalType": "uint256",
                "name": "roundId",
                "type": "uint256"
            },
            {
                "indexed": false,
                "internalType": "uint256",
                "name": "updatedAt",
                "type": "uint256"
            }
        ],
        "name": "AnswerUpdated",
        "type": "event"
    },
    {
        "inputs": [],
        "name": "decimals",
        "outputs": [
            {
                "internalType": "uint8",
                "name": "",
                "type": "uint8"
            }
        ],
        "stateMutability": "view",
        "type": "function"
    },
    {
        "inputs": [],
        "name": "description",
        "outputs": [
            {
                "internalType": "string",
                "name": "",
                "type": "string"
            }
        ],
        "stateMutability": "view",
        "type": "function"
    }
]"#;

pub fn proxy_contract(
    eth: web3::api::Eth<WebSocket>,
    address: Address,
) -> Result<Contract<WebSocket>, ChainError> {
    Ok(Contract::from_json(eth, address, PROXY_ABI.as_bytes())?)
}

pub fn aggregator_contract(
    eth: web3::api::Eth<WebSocket>,
    address: Address,
) -> Result<Contract<WebSocket>, ChainError> {
    Ok(Contract::from_json(eth, address, AGGREGATOR_ABI.as_bytes())?)
}

pub fn answer_updated_event() -> Result<Event, ChainError> {
    let abi = ethabi::Contract::load(AGGREGATOR_ABI.as_bytes())?;
    Ok(abi.event("AnswerUpdated")?.clone())
}

/// Narrows the `decimals()` word to the `uint8` the ABI declares.
pub fn decimals_from_word(word: U256) -> Result<u8, ChainError> {
    if word > U256::from(u8::MAX) {
        return Err(ChainError::DecimalsOutOfRange(word));
    }
    Ok(word.low_u32() as u8)
}

/// Topic0 used to filter the aggregator's logs down to `AnswerUpdated`.
pub fn answer_updated_topic(event: &Event) -> H256 {
    event.signature()
}

pub fn decode_answer_updated(event: &Event, log: RawLog) -> Result<AnswerUpdate, ChainError> {
    let parsed = event.parse_log(log)?;

    let mut current = None;
    let mut round_id = None;
    let mut updated_at = None;
    for param in parsed.params {
        match (param.name.as_str(), param.value) {
            ("current", Token::Int(value)) => current = Some(value),
            ("roundId", Token::Uint(value)) => round_id = Some(value),
            ("updatedAt", Token::Uint(value)) => updated_at = Some(value),
            _ => {}
        }
    }

    Ok(AnswerUpdate {
        current: current.ok_or(ChainError::MissingField("current"))?,
        round_id: round_id.ok_or(ChainError::MissingField("roundId"))?,
        updated_at: updated_at.ok_or(ChainError::MissingField("updatedAt"))?,
    })
}
