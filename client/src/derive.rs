//! Pure derivations over raw chain values
//!
//! Every function here is total: a zero denominator yields zero instead of
//! an error, and intermediate products are widened to 512 bits so nothing
//! overflows before the division.

use ethers::types::{U256, U512};
use love20_protocol::{PairReserves, BPS_DENOMINATOR};

/// 10^18
pub fn wad() -> U256 {
    U256::exp10(18)
}

/// `a * b / denominator` without intermediate overflow; saturates at `U256::MAX`
pub fn mul_div(a: U256, b: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::zero();
    }
    let wide = a.full_mul(b) / U512::from(denominator);
    U256::try_from(wide).unwrap_or(U256::MAX)
}

fn to_u64_saturating(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// `numerator / denominator` scaled by 10^18
pub fn ratio_wad(numerator: U256, denominator: U256) -> U256 {
    mul_div(numerator, wad(), denominator)
}

/// `part / total` in basis points
pub fn share_bps(part: U256, total: U256) -> u64 {
    to_u64_saturating(mul_div(part, U256::from(BPS_DENOMINATOR), total))
}

/// Yearly return on `principal` in basis points, given a per-round reward
pub fn annualized_yield_bps(reward_per_round: U256, rounds_per_year: u64, principal: U256) -> u64 {
    let yearly = reward_per_round.saturating_mul(U256::from(rounds_per_year));
    share_bps(yearly, principal)
}

/// How full a capacity-bounded extension is, in basis points
pub fn capacity_usage_bps(used: U256, capacity: U256) -> u64 {
    share_bps(used, capacity)
}

/// Uniswap-V2 `quote`: amount of B equivalent to `amount_a` at current reserves
pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> U256 {
    mul_div(amount_a, reserve_b, reserve_a)
}

/// Uniswap-V2 `getAmountOut` with the 0.3% fee
pub fn amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::zero();
    }
    let amount_in_with_fee = amount_in.full_mul(U256::from(997));
    let denominator = reserve_in.full_mul(U256::from(1000)) + amount_in_with_fee;
    let out = match amount_in_with_fee.checked_mul(U512::from(reserve_out)) {
        Some(numerator) => numerator / denominator,
        None => {
            // Scale input and denominator down together until the product fits
            let shift = amount_in_with_fee.bits().saturating_sub(256);
            let numerator = (amount_in_with_fee >> shift) * U512::from(reserve_out);
            numerator / (denominator >> shift)
        }
    };
    U256::try_from(out).unwrap_or(U256::MAX).min(reserve_out)
}

/// Price of one token in parent tokens, scaled by 10^18
pub fn price_wad(reserves: &PairReserves) -> U256 {
    ratio_wad(reserves.parent_reserve, reserves.token_reserve)
}

/// Total pool value expressed in parent tokens (both sides are worth the same)
pub fn pool_value_in_parent(reserves: &PairReserves) -> U256 {
    reserves.parent_reserve.saturating_mul(U256::from(2))
}

/// Value of `lp_balance` out of `lp_total_supply` in a pool worth `pool_value`
pub fn lp_share_value(lp_balance: U256, lp_total_supply: U256, pool_value: U256) -> U256 {
    mul_div(lp_balance, pool_value, lp_total_supply)
}
