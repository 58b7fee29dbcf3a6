use anchor_lang::prelude::*;

pub type VaultResult<T = ()> = std::result::Result<T, ErrorCode>;

#[error_code]
#[derive(PartialEq, Eq)]
pub enum ErrorCode {
    #[msg("Default")]
    Default,
    #[msg("Vault Math Error")]
    MathError,
    #[msg("Casting Failure")]
    CastingFailure,
    #[msg("Division By Zero")]
    DivisionByZero,
    #[msg("Unauthorized")]
    Unauthorized,
    #[msg("CapExceeded")]
    CapExceeded,
    #[msg("UserCapExceeded")]
    UserCapExceeded,
    #[msg("NotAllowlisted")]
    NotAllowlisted,
    #[msg("BelowMinDeposit")]
    BelowMinDeposit,
    #[msg("LockupActive")]
    LockupActive,
    #[msg("SlippageExceeded")]
    SlippageExceeded,
    #[msg("Reentrancy")]
    Reentrancy,
    #[msg("InsufficientShares")]
    InsufficientShares,
    #[msg("InsufficientLiquidity")]
    InsufficientLiquidity,
    #[msg("InvalidTickRange")]
    InvalidTickRange,
    #[msg("InvalidStoplossRange")]
    InvalidStoplossRange,
    #[msg("StoplossNotBreached")]
    StoplossNotBreached,
    #[msg("InvalidParameter")]
    InvalidParameter,
    #[msg("InvalidPoolTokens")]
    InvalidPoolTokens,
    #[msg("TooManyStrategists")]
    TooManyStrategists,
    #[msg("VaultNotRegistered")]
    VaultNotRegistered,
    #[msg("VaultAlreadyRegistered")]
    VaultAlreadyRegistered,
    #[msg("ZeroAmount")]
    ZeroAmount,
    #[msg("AdapterAlreadyBound")]
    AdapterAlreadyBound,
    #[msg("AdapterNotBound")]
    AdapterNotBound,
    #[msg("PositionNotFound")]
    PositionNotFound,
    #[msg("InsufficientPositionLiquidity")]
    InsufficientPositionLiquidity,
    #[msg("InsufficientCollateral")]
    InsufficientCollateral,
    #[msg("HealthFactorTooLow")]
    HealthFactorTooLow,
    #[msg("ReserveNotFound")]
    ReserveNotFound,
    #[msg("TickOutOfBounds")]
    TickOutOfBounds,
    #[msg("SqrtPriceOutOfBounds")]
    SqrtPriceOutOfBounds,
    #[msg("TwapUnavailable")]
    TwapUnavailable,
}

/// Coarse classification callers (keepers, strategists, indexers) branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the strategist, owner or keeper role.
    Authorization,
    /// Cap, allowlist, minimum deposit or lockup rejected the request.
    PolicyViolation,
    /// A swap produced less than the caller's floor.
    SlippageViolation,
    /// The operation is undefined for the vault's current state.
    StateViolation,
    /// The underlying AMM or lending market rejected the call.
    AdapterFailure,
    Math,
}

impl ErrorCode {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::Unauthorized => ErrorKind::Authorization,
            ErrorCode::CapExceeded
            | ErrorCode::UserCapExceeded
            | ErrorCode::NotAllowlisted
            | ErrorCode::BelowMinDeposit
            | ErrorCode::LockupActive => ErrorKind::PolicyViolation,
            ErrorCode::SlippageExceeded => ErrorKind::SlippageViolation,
            ErrorCode::Default
            | ErrorCode::Reentrancy
            | ErrorCode::InsufficientShares
            | ErrorCode::InsufficientLiquidity
            | ErrorCode::InvalidTickRange
            | ErrorCode::InvalidStoplossRange
            | ErrorCode::StoplossNotBreached
            | ErrorCode::InvalidParameter
            | ErrorCode::InvalidPoolTokens
            | ErrorCode::TooManyStrategists
            | ErrorCode::VaultNotRegistered
            | ErrorCode::VaultAlreadyRegistered
            | ErrorCode::ZeroAmount => ErrorKind::StateViolation,
            ErrorCode::AdapterAlreadyBound
            | ErrorCode::AdapterNotBound
            | ErrorCode::PositionNotFound
            | ErrorCode::InsufficientPositionLiquidity
            | ErrorCode::InsufficientCollateral
            | ErrorCode::HealthFactorTooLow
            | ErrorCode::ReserveNotFound
            | ErrorCode::TwapUnavailable => ErrorKind::AdapterFailure,
            ErrorCode::MathError
            | ErrorCode::CastingFailure
            | ErrorCode::DivisionByZero
            | ErrorCode::TickOutOfBounds
            | ErrorCode::SqrtPriceOutOfBounds => ErrorKind::Math,
        }
    }
}

#[macro_export]
macro_rules! math_error {
    () => {{
        || {
            let error_code = $crate::error::ErrorCode::MathError;
            msg!("Error {} thrown at {}:{}", error_code, file!(), line!());
            error_code
        }
    }};
}
