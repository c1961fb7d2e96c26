//! lpwallet client SDK: encrypted key vault and concentrated-liquidity
//! position math.

mod error;
mod key_cache;
mod liquidity;
mod mint;
mod networks;
mod prompt;
mod ratio;
mod tick_math;
mod utils;
mod vault;

pub use error::ClientError;
pub use key_cache::KeyCache;
pub use liquidity::{
    align_to_spacing, amounts_for_liquidity, classify_status, compute_range,
    size_from_single_sided_amount, summarize_position, PoolState, PositionAmounts,
    PositionRange, PositionStatus, PositionSummary, Token,
};
pub use mint::{
    collect_all, load_mint_requests, load_pool_state, plan_mint, plan_mints,
    read_mint_requests_csv, remove_position, unix_now, CollectParams, DecreaseLiquidityParams,
    MintParams, MintPlan, MintRequest, PoolStateFile, DEADLINE_SECS,
};
pub use networks::{all_networks, network, network_names, Network};
pub use prompt::{prompt_new_password, PasswordPrompt, StaticPassword, TerminalPrompt};
pub use ratio::{parse_decimal_to_ratio, ratio_to_sqrt_price_x96, tick_at_price, PriceRatio};
pub use tick_math::{
    get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, max_sqrt_ratio, min_sqrt_ratio, SqrtPriceX96,
    Tick, MAX_TICK, MIN_TICK,
};
pub use utils::{
    checksummed, keccak256, parse_address, parse_decimal_biguint, parse_decimal_u128,
    u128_string, Address,
};
pub use vault::{
    create_and_encrypt, decrypt, decrypt_key, derive_key_from_password, encrypt_key,
    encrypt_to_file, EncryptedKeyFile, PasswordDerivedKey, SigningKey, MIN_PASSWORD_LEN,
};
