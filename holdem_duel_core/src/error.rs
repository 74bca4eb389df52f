use crate::card::Card;
use crate::state::PlayerId;
use thiserror::Error;

pub type GameResult<T> = Result<T, GameError>;

/// 牌局内的校验错误。
///
/// 所有错误都是局部的：返回错误时牌局状态保持不变，
/// 由调用方转告发起动作的玩家。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game is not active")]
    NotActiveGame,

    #[error("not your turn")]
    OutOfTurn,

    #[error("cannot check, you must call or raise")]
    MustCallOrRaise,

    #[error("no bet to call, you can check")]
    NothingToCall,

    #[error("raise must be at least {minimum}")]
    RaiseTooSmall { minimum: u32 },

    #[error("not enough chips")]
    InsufficientChips,

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("deck is empty")]
    DeckExhausted,

    #[error("player {0} is not seated in this session")]
    UnknownPlayer(PlayerId),

    #[error("both seats belong to the same player")]
    DuplicatePlayer,

    #[error("stacked deck repeats card {0}")]
    InvalidDeck(Card),

    #[error("session is still in progress")]
    SessionInProgress,

    #[error("combined stacks exceed {max} chips")]
    StakeTooLarge { max: u32 },
}
