use crate::card::{Card, Rank};
use crate::state::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 牌型类别，从小到大排列
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum HandCategory {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

/// 牌型等级 (HandRank)
/// 1. 变体的顺序从小到大排列，可以直接利用 `Ord` 比较任意两手牌。
/// 2. 变体内部存储了比较所需的全部信息（对子的大小、踢脚牌等）。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum HandRank {
    HighCard(Rank, Rank, Rank, Rank, Rank),
    OnePair(Rank, Rank, Rank, Rank),     // 对子, 三张踢脚
    TwoPair(Rank, Rank, Rank),           // 大对, 小对, 踢脚
    ThreeOfAKind(Rank, Rank, Rank),      // 三条, 两张踢脚
    Straight(Rank),                      // 最高牌
    Flush(Rank, Rank, Rank, Rank, Rank),
    FullHouse(Rank, Rank),               // 三条的点数, 对子的点数
    FourOfAKind(Rank, Rank),             // 四条, 踢脚
    StraightFlush(Rank),
    RoyalFlush,
}

impl HandRank {
    pub fn category(&self) -> HandCategory {
        match self {
            HandRank::HighCard(..) => HandCategory::HighCard,
            HandRank::OnePair(..) => HandCategory::Pair,
            HandRank::TwoPair(..) => HandCategory::TwoPair,
            HandRank::ThreeOfAKind(..) => HandCategory::ThreeOfAKind,
            HandRank::Straight(..) => HandCategory::Straight,
            HandRank::Flush(..) => HandCategory::Flush,
            HandRank::FullHouse(..) => HandCategory::FullHouse,
            HandRank::FourOfAKind(..) => HandCategory::FourOfAKind,
            HandRank::StraightFlush(..) => HandCategory::StraightFlush,
            HandRank::RoyalFlush => HandCategory::RoyalFlush,
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            HandCategory::HighCard => "High Card",
            HandCategory::Pair => "Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
            HandCategory::RoyalFlush => "Royal Flush",
        })
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let category = self.category();
        match self {
            HandRank::HighCard(r1, ..)
            | HandRank::OnePair(r1, ..)
            | HandRank::ThreeOfAKind(r1, ..)
            | HandRank::FourOfAKind(r1, ..)
            | HandRank::Flush(r1, ..) => write!(f, "{} ({})", category, r1),
            HandRank::TwoPair(r1, r2, _) => write!(f, "{} ({}, {})", category, r1, r2),
            HandRank::FullHouse(r1, r2) => write!(f, "{} ({} over {})", category, r1, r2),
            HandRank::Straight(high) | HandRank::StraightFlush(high) => {
                write!(f, "{} (to {})", category, high)
            }
            HandRank::RoyalFlush => write!(f, "{}", category),
        }
    }
}

// --- 牌型评估逻辑 ---

/// 从 5 到 7 张牌中找出最优的 5 张组合的牌力。
/// 牌数不在这个范围内时无法评估，返回 `None`。
pub fn find_best_hand(cards: &[Card]) -> Option<HandRank> {
    let n = cards.len();
    if !(5..=7).contains(&n) {
        return None;
    }

    // 用位掩码枚举所有 5 张组合 (7 选 5 只有 21 种)
    (0u32..1 << n)
        .filter(|mask| mask.count_ones() == 5)
        .map(|mask| {
            let mut hand = [cards[0]; 5];
            let picked = cards.iter().enumerate().filter(|(i, _)| mask & (1 << i) != 0);
            for (slot, (_, card)) in hand.iter_mut().zip(picked) {
                *slot = *card;
            }
            evaluate_five(&hand)
        })
        .max()
}

/// 评估恰好 5 张牌
fn evaluate_five(hand: &[Card; 5]) -> HandRank {
    let mut ranks = hand.map(|c| c.rank);
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = hand.iter().all(|c| c.suit == hand[0].suit);
    // A-2-3-4-5 中 A 当作最小的牌
    let is_wheel = ranks == [Rank::Ace, Rank::Five, Rank::Four, Rank::Three, Rank::Two];
    let is_straight = is_wheel || ranks.windows(2).all(|w| w[0] as u8 == w[1] as u8 + 1);
    let high = if is_wheel { Rank::Five } else { ranks[0] };

    if is_straight && is_flush {
        return if high == Rank::Ace { HandRank::RoyalFlush } else { HandRank::StraightFlush(high) };
    }

    // (出现次数, 点数)，先按次数再按点数从大到小排
    let mut groups: Vec<(u8, Rank)> = Vec::with_capacity(5);
    for rank in ranks {
        match groups.iter_mut().find(|(_, r)| *r == rank) {
            Some((count, _)) => *count += 1,
            None => groups.push((1, rank)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));
    let g = |i: usize| groups[i].1;

    match (groups[0].0, groups.get(1).map_or(0, |x| x.0)) {
        (4, _) => HandRank::FourOfAKind(g(0), g(1)),
        (3, 2) => HandRank::FullHouse(g(0), g(1)),
        _ if is_flush => HandRank::Flush(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]),
        _ if is_straight => HandRank::Straight(high),
        (3, _) => HandRank::ThreeOfAKind(g(0), g(1), g(2)),
        (2, 2) => HandRank::TwoPair(g(0), g(1), g(2)),
        (2, _) => HandRank::OnePair(g(0), g(1), g(2), g(3)),
        _ => HandRank::HighCard(ranks[0], ranks[1], ranks[2], ranks[3], ranks[4]),
    }
}

// --- 比较多手牌 ---

/// 某位玩家的评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub player_id: PlayerId,
    pub rank: HandRank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowdownOutcome {
    /// 唯一的最大牌
    Winner(Evaluation),
    /// 多手牌并列最大，平分奖池
    Split(Vec<Evaluation>),
}

/// 评估每位玩家的牌并找出赢家。
/// 无法评估的手牌 (少于 5 张或多于 7 张) 不参与比较，全部无法评估时返回 `None`。
pub fn evaluate_winner(hands: &[(PlayerId, Vec<Card>)]) -> Option<ShowdownOutcome> {
    let evaluations: Vec<Evaluation> = hands
        .iter()
        .filter_map(|(player_id, cards)| {
            find_best_hand(cards).map(|rank| Evaluation { player_id: *player_id, rank })
        })
        .collect();

    let best = evaluations.iter().map(|e| e.rank).max()?;
    let mut leaders: Vec<Evaluation> = evaluations.into_iter().filter(|e| e.rank == best).collect();

    if leaders.len() == 1 {
        leaders.pop().map(ShowdownOutcome::Winner)
    } else {
        Some(ShowdownOutcome::Split(leaders))
    }
}

// --- 单元测试 ---
