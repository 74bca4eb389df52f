use crate::card::{Card, DealtCard, Deck};
use crate::error::{GameError, GameResult};
use crate::evaluator::HandRank;
use crate::logic::minimum_raise;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type SessionId = Uuid;
pub type PlayerId = Uuid;

/// 小盲注金额
pub const SMALL_BLIND: u32 = 5;
/// 大盲注金额
pub const BIG_BLIND: u32 = 10;
/// 新账户的初始筹码
pub const STARTING_CHIPS: u32 = 1000;
/// 公共牌张数
pub const COMMUNITY_CARDS: usize = 5;

/// 入座请求：上层已经认证过的玩家 ID 以及带入的筹码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: PlayerId,
    pub chips: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Round {
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Round {
    /// 该阶段应当已经翻开的公共牌数量
    pub fn revealed_cards(self) -> usize {
        match self {
            Round::PreFlop => 0,
            Round::Flop => 3,
            Round::Turn => 4,
            Round::River | Round::Showdown => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "amount", rename_all = "lowercase")]
pub enum PlayerAction {
    Fold,       // 弃牌
    Check,      // 过牌
    Call,       // 跟注
    Raise(u32), // 加注，金额为加注后本轮的总下注额
}

impl PlayerAction {
    /// 把线上传来的动作名解析成动作。
    /// 未知的动作名或者缺少金额的加注都会得到 `InvalidAction`。
    pub fn parse(kind: &str, amount: Option<u32>) -> GameResult<PlayerAction> {
        match (kind.trim().to_ascii_lowercase().as_str(), amount) {
            ("fold", _) => Ok(PlayerAction::Fold),
            ("check", _) => Ok(PlayerAction::Check),
            ("call", _) => Ok(PlayerAction::Call),
            ("raise", Some(amount)) => Ok(PlayerAction::Raise(amount)),
            ("raise", None) => Err(GameError::InvalidAction("raise amount is required".to_string())),
            (other, _) => Err(GameError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayerAction::Fold => write!(f, "fold"),
            PlayerAction::Check => write!(f, "check"),
            PlayerAction::Call => write!(f, "call"),
            PlayerAction::Raise(amount) => write!(f, "raise {}", amount),
        }
    }
}

// 用于告知客户端当前合法的动作类型，简化客户端UI逻辑
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOption {
    Fold,
    Check,
    Call(u32),  // 实际会投入的筹码 (不够时为全下)
    Raise(u32), // 最小的加注总额
}

/// 单个玩家在本局中的状态，只由牌局自己持有
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub chips: u32,             // 剩余筹码
    pub hand: Vec<DealtCard>,   // 0 或 2 张底牌
    pub current_bet: u32,       // 本轮已下注、尚未收进奖池的金额
    pub folded: bool,
    pub connected: bool,
    pub last_action: Option<PlayerAction>,
    pub has_acted: bool,        // 本轮是否已经行动过 (盲注不算)
}

impl PlayerState {
    pub(crate) fn seated(seat: Seat) -> PlayerState {
        PlayerState {
            id: seat.id,
            chips: seat.chips,
            hand: Vec::with_capacity(2),
            current_bet: 0,
            folded: false,
            connected: true,
            last_action: None,
            has_acted: false,
        }
    }

    /// 未弃牌且筹码已经全部投入
    pub fn is_all_in(&self) -> bool {
        !self.folded && self.chips == 0
    }

    pub fn hole_cards(&self) -> Vec<Card> {
        self.hand.iter().map(|c| c.card).collect()
    }
}

/// 一条被接受的动作记录，按顺序重放即可复现整局
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRecord {
    pub player_id: PlayerId,
    pub action: PlayerAction,
}

/// 结算时每位玩家的结果
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShowdownResult {
    pub player_id: PlayerId,
    /// 摊牌时的最终牌型，弃牌结束时为 None
    pub hand_rank: Option<HandRank>,
    /// 摊牌时亮出的底牌
    pub cards: Option<(Card, Card)>,
    /// 该玩家从奖池中赢得的筹码
    pub winnings: u32,
}

/// 等待对手的牌局：只有第一位玩家入座
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSession {
    pub id: SessionId,
    pub host: Seat,
}

impl PendingSession {
    pub fn new(id: SessionId, host: Seat) -> PendingSession {
        PendingSession { id, host }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::Waiting
    }
}

/// 一局单挑牌局的完整状态。
///
/// 座位固定为两个：`players[dealer_index]` 是庄家 (小盲)，另一个是大盲。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSession {
    pub id: SessionId,
    pub status: SessionStatus,
    pub round: Round,
    pub pot: u32, // 已结算进奖池的筹码
    // 固定 5 张，是否可见由 revealed 决定
    pub community_cards: Vec<DealtCard>,
    pub players: [PlayerState; 2],
    pub dealer_index: usize,
    pub current_player_index: usize,
    pub winner_id: Option<PlayerId>,
    pub winning_hand: Option<String>,
    pub results: Vec<ShowdownResult>,
    pub history: Vec<ActionRecord>,
    // 剩余牌堆只存在于服务端内存中
    #[serde(skip, default = "Deck::empty")]
    pub(crate) deck: Deck,
}

// --- GameSession 的查询方法 ---

impl GameSession {
    /// 当前应该行动的玩家，牌局未进行时为 None
    pub fn current_player_id(&self) -> Option<PlayerId> {
        (self.status == SessionStatus::Active).then(|| self.players[self.current_player_index].id)
    }

    pub fn dealer_id(&self) -> PlayerId {
        self.players[self.dealer_index].id
    }

    pub fn seat_of(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == player_id)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn opponent_of(&self, player_id: PlayerId) -> Option<&PlayerState> {
        self.seat_of(player_id).map(|seat| &self.players[1 - seat])
    }

    /// 未弃牌玩家中的最高下注额
    pub fn max_bet(&self) -> u32 {
        self.players.iter().filter(|p| !p.folded).map(|p| p.current_bet).max().unwrap_or(0)
    }

    /// 桌上全部筹码：剩余筹码 + 本轮下注 + 奖池。整局中保持不变。
    pub fn chips_in_play(&self) -> u32 {
        self.players.iter().map(|p| p.chips + p.current_bet).sum::<u32>() + self.pot
    }

    pub fn revealed_community_cards(&self) -> Vec<Card> {
        self.community_cards.iter().filter(|c| c.revealed).map(|c| c.card).collect()
    }

    /// 尚未发出的牌
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// 当前行动者可以做的动作
    pub fn legal_actions(&self) -> Vec<ActionOption> {
        if self.status != SessionStatus::Active {
            return Vec::new();
        }

        let player = &self.players[self.current_player_index];
        let high = self.max_bet();
        let deficit = high - player.current_bet;

        let mut options = vec![ActionOption::Fold];
        if deficit == 0 {
            options.push(ActionOption::Check);
        } else {
            options.push(ActionOption::Call(deficit.min(player.chips)));
        }

        let minimum = minimum_raise(high);
        if minimum - player.current_bet <= player.chips {
            options.push(ActionOption::Raise(minimum));
        }
        options
    }
}
