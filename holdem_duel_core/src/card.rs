use crate::error::{GameError, GameResult};
use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// --- 核心数据结构定义 ---

/// 一副牌的张数
pub const DECK_SIZE: usize = 52;

/// 花色 (Suit)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,   // 红心 ♥
    Diamonds, // 方块 ♦
    Clubs,    // 梅花 ♣
    Spades,   // 黑桃 ♠
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];
}

/// 点数 (Rank)
/// Ord 的派生让 Ace 默认是最大的，A-2-3-4-5 顺子在评估时单独处理
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
    ];
}

/// 单张扑克牌的身份 (点数 + 花色)，整副牌里每个身份只出现一次
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }
}

/// 已经离开牌堆的牌。
/// `revealed` 只会从 false 变成 true，视图层据此决定是否隐藏这张牌。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct DealtCard {
    pub card: Card,
    pub revealed: bool,
}

impl DealtCard {
    pub fn reveal(&mut self) {
        self.revealed = true;
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Hearts => "♥",
            Suit::Diamonds => "♦",
            Suit::Clubs => "♣",
            Suit::Spades => "♠",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

// --- 牌堆 ---

/// 牌堆。Vec 的末尾是牌堆顶，发牌时从末尾取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// 创建一副按花色、点数排好序的完整 52 张牌
    pub fn new() -> Deck {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for &suit in &Suit::ALL {
            for &rank in &Rank::ALL {
                cards.push(Card { rank, suit });
            }
        }
        Deck { cards }
    }

    /// 空牌堆，只用于反序列化 (牌堆不会发给客户端)
    pub(crate) fn empty() -> Deck {
        Deck { cards: Vec::new() }
    }

    /// 预先安排好发牌顺序的牌堆：`top[0]` 最先发出，
    /// 其余的牌按默认顺序排在后面。用于复盘和测试。
    pub fn stacked(top: &[Card]) -> GameResult<Deck> {
        let mut seen = HashSet::with_capacity(top.len());
        for card in top {
            if !seen.insert(*card) {
                return Err(GameError::InvalidDeck(*card));
            }
        }

        let mut cards: Vec<Card> = Deck::new().cards.into_iter().filter(|c| !seen.contains(c)).collect();
        cards.extend(top.iter().rev());
        Ok(Deck { cards })
    }

    /// Fisher–Yates 洗牌，随机源由调用方提供
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    /// 从牌堆顶发一张牌
    pub fn deal_card(&mut self, revealed: bool) -> GameResult<DealtCard> {
        self.cards
            .pop()
            .map(|card| DealtCard { card, revealed })
            .ok_or(GameError::DeckExhausted)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// 剩余的牌，最后一个元素是下一张要发的牌
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

impl Default for Deck {
    fn default() -> Self {
        Deck::new()
    }
}

// --- 单元测试 ---
