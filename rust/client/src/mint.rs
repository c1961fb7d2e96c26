use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::ClientError;
use crate::liquidity::{compute_range, size_from_single_sided_amount, PoolState, Token};
use crate::tick_math::Tick;
use crate::utils::{checksummed, parse_decimal_biguint, parse_decimal_u128, u128_string, Address};

/// Seconds a planned mint or removal stays valid on chain.
pub const DEADLINE_SECS: u64 = 600;

/// Pool snapshot as it appears in files and request bodies. Big values are
/// decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStateFile {
    pub sqrt_price_x96: String,
    pub tick: i32,
    pub liquidity: String,
    pub tick_spacing: i32,
    pub fee: u32,
}

impl PoolStateFile {
    pub fn to_pool_state(&self) -> Result<PoolState, ClientError> {
        Ok(PoolState {
            sqrt_price_x96: parse_decimal_biguint(&self.sqrt_price_x96)?,
            tick: self.tick,
            liquidity: parse_decimal_u128(&self.liquidity)?,
            tick_spacing: self.tick_spacing,
            fee: self.fee,
        })
    }
}

impl From<&PoolState> for PoolStateFile {
    fn from(pool: &PoolState) -> Self {
        Self {
            sqrt_price_x96: pool.sqrt_price_x96.to_string(),
            tick: pool.tick,
            liquidity: pool.liquidity.to_string(),
            tick_spacing: pool.tick_spacing,
            fee: pool.fee,
        }
    }
}

pub fn load_pool_state(path: &Path) -> Result<PoolState, ClientError> {
    let contents = fs::read_to_string(path)?;
    let file: PoolStateFile = serde_json::from_str(&contents)?;
    file.to_pool_state()
}

/// One position to open: a price band and a single-sided budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    #[serde(with = "checksummed")]
    pub token0: Address,
    #[serde(with = "checksummed")]
    pub token1: Address,
    pub fee: u32,
    pub price_lower: String,
    pub price_upper: String,
    #[serde(with = "u128_string")]
    pub amount: u128,
    #[serde(default)]
    pub committed: Token,
}

/// Arguments for the position manager's `mint`, ready for an external
/// submitter to encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    #[serde(with = "checksummed")]
    pub token0: Address,
    #[serde(with = "checksummed")]
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: Tick,
    pub tick_upper: Tick,
    #[serde(with = "u128_string")]
    pub amount0_desired: u128,
    #[serde(with = "u128_string")]
    pub amount1_desired: u128,
    #[serde(with = "u128_string")]
    pub amount0_min: u128,
    #[serde(with = "u128_string")]
    pub amount1_min: u128,
    #[serde(with = "checksummed")]
    pub recipient: Address,
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintPlan {
    pub params: MintParams,
    #[serde(with = "u128_string")]
    pub liquidity: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecreaseLiquidityParams {
    #[serde(with = "u128_string")]
    pub token_id: u128,
    #[serde(with = "u128_string")]
    pub liquidity: u128,
    #[serde(with = "u128_string")]
    pub amount0_min: u128,
    #[serde(with = "u128_string")]
    pub amount1_min: u128,
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectParams {
    #[serde(with = "u128_string")]
    pub token_id: u128,
    #[serde(with = "checksummed")]
    pub recipient: Address,
    #[serde(with = "u128_string")]
    pub amount0_max: u128,
    #[serde(with = "u128_string")]
    pub amount1_max: u128,
}

pub fn unix_now() -> Result<u64, ClientError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|e| ClientError::InvalidInput(format!("system clock before epoch: {e}")))
}

fn deadline_from(now: u64) -> Result<u64, ClientError> {
    now.checked_add(DEADLINE_SECS)
        .ok_or_else(|| ClientError::InvalidInput(format!("timestamp {now} too large")))
}

pub fn plan_mint(
    request: &MintRequest,
    pool: &PoolState,
    recipient: Address,
    now: u64,
) -> Result<MintPlan, ClientError> {
    if request.token0 >= request.token1 {
        return Err(ClientError::InvalidInput(format!(
            "token0 {} must sort below token1 {}",
            request.token0, request.token1
        )));
    }
    if request.fee != pool.fee {
        return Err(ClientError::InvalidInput(format!(
            "request fee {} does not match pool fee {}",
            request.fee, pool.fee
        )));
    }
    let range = compute_range(&request.price_lower, &request.price_upper, pool)?;
    let sized = size_from_single_sided_amount(pool, &range, request.amount, request.committed)?;
    debug!(
        tick_lower = range.tick_lower,
        tick_upper = range.tick_upper,
        liquidity = %sized.liquidity,
        "planned mint"
    );
    Ok(MintPlan {
        params: MintParams {
            token0: request.token0,
            token1: request.token1,
            fee: request.fee,
            tick_lower: range.tick_lower,
            tick_upper: range.tick_upper,
            amount0_desired: sized.amount0,
            amount1_desired: sized.amount1,
            amount0_min: 0,
            amount1_min: 0,
            recipient,
            deadline: deadline_from(now)?,
        },
        liquidity: sized.liquidity,
    })
}

/// Plans every request against the same pool snapshot. Stops at the first
/// failure; nothing is partially returned.
pub fn plan_mints(
    requests: &[MintRequest],
    pool: &PoolState,
    recipient: Address,
    now: u64,
) -> Result<Vec<MintPlan>, ClientError> {
    requests
        .iter()
        .map(|request| plan_mint(request, pool, recipient, now))
        .collect()
}

/// One row of a batch CSV with the header
/// `token0,token1,fee,maxAmount0,maxAmount1,priceLower,priceUpper`.
#[derive(Debug, Deserialize)]
struct MintRequestRow {
    #[serde(with = "checksummed")]
    token0: Address,
    #[serde(with = "checksummed")]
    token1: Address,
    fee: u32,
    #[serde(rename = "maxAmount0", deserialize_with = "blank_as_zero")]
    max_amount0: u128,
    #[serde(rename = "maxAmount1", deserialize_with = "blank_as_zero")]
    max_amount1: u128,
    #[serde(rename = "priceLower")]
    price_lower: String,
    #[serde(rename = "priceUpper")]
    price_upper: String,
}

fn blank_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    let value = String::deserialize(deserializer)?;
    if value.trim().is_empty() {
        return Ok(0);
    }
    parse_decimal_u128(&value).map_err(serde::de::Error::custom)
}

impl TryFrom<MintRequestRow> for MintRequest {
    type Error = ClientError;

    /// The committed side is token0 when `maxAmount0` is non-zero, else token1.
    fn try_from(row: MintRequestRow) -> Result<Self, Self::Error> {
        let (amount, committed) = match (row.max_amount0, row.max_amount1) {
            (0, 0) => {
                return Err(ClientError::InvalidInput(format!(
                    "mint row {} / {} commits neither token",
                    row.token0, row.token1
                )))
            }
            (0, amount1) => (amount1, Token::Token1),
            (amount0, _) => (amount0, Token::Token0),
        };
        Ok(MintRequest {
            token0: row.token0,
            token1: row.token1,
            fee: row.fee,
            price_lower: row.price_lower,
            price_upper: row.price_upper,
            amount,
            committed,
        })
    }
}

/// Reads batch mint requests. `.csv` files use the column layout of
/// [`read_mint_requests_csv`]; anything else is a JSON array of
/// [`MintRequest`].
pub fn load_mint_requests(path: &Path) -> Result<Vec<MintRequest>, ClientError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        return read_mint_requests_csv(File::open(path)?);
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn read_mint_requests_csv<R: Read>(reader: R) -> Result<Vec<MintRequest>, ClientError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    reader
        .deserialize::<MintRequestRow>()
        .map(|row| MintRequest::try_from(row?))
        .collect()
}

pub fn collect_all(token_id: u128, recipient: Address) -> CollectParams {
    CollectParams {
        token_id,
        recipient,
        amount0_max: u128::MAX,
        amount1_max: u128::MAX,
    }
}

/// Withdraws all of a position's liquidity and then sweeps the tokens.
pub fn remove_position(
    token_id: u128,
    liquidity: u128,
    recipient: Address,
    now: u64,
) -> Result<(DecreaseLiquidityParams, CollectParams), ClientError> {
    let decrease = DecreaseLiquidityParams {
        token_id,
        liquidity,
        amount0_min: 0,
        amount1_min: 0,
        deadline: deadline_from(now)?,
    };
    Ok((decrease, collect_all(token_id, recipient)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_address;

    const ONE_E18: u128 = 1_000_000_000_000_000_000;
    const TOKEN_A: &str = "0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984";
    const TOKEN_B: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
    const RECIPIENT: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

    fn pool() -> PoolState {
        PoolState {
            sqrt_price_x96: parse_decimal_biguint("97034285709124592626698884146").unwrap(),
            tick: 4054,
            liquidity: 5_000_000_000_000_000_000,
            tick_spacing: 60,
            fee: 3000,
        }
    }

    fn request(committed: Token) -> MintRequest {
        MintRequest {
            token0: parse_address(TOKEN_A).unwrap(),
            token1: parse_address(TOKEN_B).unwrap(),
            fee: 3000,
            price_lower: "1.2".to_string(),
            price_upper: "1.8".to_string(),
            amount: ONE_E18,
            committed,
        }
    }

    #[test]
    fn plans_token0_mint() {
        let recipient = parse_address(RECIPIENT).unwrap();
        let plan = plan_mint(&request(Token::Token0), &pool(), recipient, 1_700_000_000).unwrap();
        assert_eq!(plan.liquidity, 14043142162043262539);
        let params = plan.params;
        assert_eq!((params.tick_lower, params.tick_upper), (1800, 5880));
        assert_eq!(params.amount0_desired, ONE_E18);
        assert_eq!(params.amount1_desired, 1833690465699020019);
        assert_eq!((params.amount0_min, params.amount1_min), (0, 0));
        assert_eq!(params.recipient, recipient);
        assert_eq!(params.deadline, 1_700_000_600);
    }

    #[test]
    fn plans_token1_mint() {
        let plan = plan_mint(&request(Token::Token1), &pool(), Address::ZERO, 0).unwrap();
        assert_eq!(plan.liquidity, 7658403871718820831);
        assert_eq!(plan.params.amount0_desired, 545348311891227843);
        assert_eq!(plan.params.amount1_desired, ONE_E18);
    }

    #[test]
    fn rejects_unsorted_tokens_and_fee_mismatch() {
        let mut swapped = request(Token::Token0);
        std::mem::swap(&mut swapped.token0, &mut swapped.token1);
        assert!(matches!(
            plan_mint(&swapped, &pool(), Address::ZERO, 0),
            Err(ClientError::InvalidInput(_))
        ));

        let mut wrong_fee = request(Token::Token0);
        wrong_fee.fee = 500;
        assert!(matches!(
            plan_mint(&wrong_fee, &pool(), Address::ZERO, 0),
            Err(ClientError::InvalidInput(_))
        ));
    }

    #[test]
    fn batch_stops_at_first_bad_request() {
        let mut bad = request(Token::Token0);
        bad.price_lower = "1.8".to_string();
        bad.price_upper = "1.2".to_string();
        let err =
            plan_mints(&[request(Token::Token0), bad], &pool(), Address::ZERO, 0).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRange(_)));
    }

    #[test]
    fn request_file_format() {
        let json = format!(
            r#"[{{"token0":"{TOKEN_A}","token1":"{TOKEN_B}","fee":3000,"price_lower":"1.2","price_upper":"1.8","amount":"1000000000000000000"}}]"#
        );
        let requests: Vec<MintRequest> = serde_json::from_str(&json).unwrap();
        assert_eq!(requests, vec![request(Token::Token0)]);

        let params = plan_mint(&requests[0], &pool(), Address::ZERO, 0).unwrap().params;
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["amount1_desired"], "1833690465699020019");
        assert_eq!(value["amount0_min"], "0");
        assert_eq!(value["deadline"], 600);
    }

    #[test]
    fn reads_csv_batch() {
        let csv = format!(
            "token0,token1,fee,maxAmount0,maxAmount1,priceLower,priceUpper\n\
             {TOKEN_A},{TOKEN_B},3000,1000000000000000000,0,1.2,1.8\n\
             {TOKEN_A}, {TOKEN_B} ,3000,,1000000000000000000,1.2,1.8\n"
        );
        let requests = read_mint_requests_csv(csv.as_bytes()).unwrap();
        assert_eq!(requests, vec![request(Token::Token0), request(Token::Token1)]);
    }

    #[test]
    fn csv_row_must_commit_a_token() {
        let csv = format!(
            "token0,token1,fee,maxAmount0,maxAmount1,priceLower,priceUpper\n\
             {TOKEN_A},{TOKEN_B},3000,0,0,1.2,1.8\n"
        );
        assert!(matches!(
            read_mint_requests_csv(csv.as_bytes()),
            Err(ClientError::InvalidInput(_))
        ));

        let missing_column = format!("token0,token1,fee\n{TOKEN_A},{TOKEN_B},3000\n");
        assert!(matches!(
            read_mint_requests_csv(missing_column.as_bytes()),
            Err(ClientError::Serde(_))
        ));
    }

    #[test]
    fn pool_state_file_round_trip() {
        let file = PoolStateFile::from(&pool());
        assert_eq!(file.sqrt_price_x96, "97034285709124592626698884146");
        assert_eq!(file.to_pool_state().unwrap(), pool());

        let mut bad = file.clone();
        bad.liquidity = "-1".to_string();
        assert!(matches!(bad.to_pool_state(), Err(ClientError::InvalidInput(_))));
    }

    #[test]
    fn collect_sweeps_everything() {
        let (decrease, collect) = remove_position(42, 1234, Address::ZERO, 100).unwrap();
        assert_eq!(decrease.liquidity, 1234);
        assert_eq!(decrease.deadline, 700);
        assert_eq!(collect.amount0_max, u128::MAX);
        assert_eq!(collect.amount1_max, u128::MAX);
        assert_eq!(collect.token_id, 42);
        assert!(remove_position(1, 1, Address::ZERO, u64::MAX).is_err());
    }
}
