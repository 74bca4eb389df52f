//! 配对大厅：最多只有一局在等待对手。

use holdem_duel_core::{PendingSession, PlayerId, Seat};
use parking_lot::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq)]
pub enum Pairing {
    /// 没有人在等，新开了一局等待对手 (或者自己已经在等)
    Waiting(PendingSession),
    /// 等待中的牌局凑齐了两个人，可以发牌了
    Matched { pending: PendingSession, guest: Seat },
}

#[derive(Default)]
pub struct Lobby {
    waiting: Mutex<Option<PendingSession>>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, seat: Seat) -> Pairing {
        let mut waiting = self.waiting.lock();

        match waiting.take() {
            // 同一个人重复进入大厅，继续等
            Some(pending) if pending.host.id == seat.id => {
                *waiting = Some(pending.clone());
                Pairing::Waiting(pending)
            }
            Some(pending) => {
                info!("玩家 {} 和 {} 配对成功，牌局 {}", pending.host.id, seat.id, pending.id);
                Pairing::Matched { pending, guest: seat }
            }
            None => {
                let pending = PendingSession::new(Uuid::new_v4(), seat);
                info!("玩家 {} 开了新牌局 {}，等待对手", seat.id, pending.id);
                *waiting = Some(pending.clone());
                Pairing::Waiting(pending)
            }
        }
    }

    /// 等待中的玩家离开，返回是否真的撤掉了一局
    pub fn leave(&self, player_id: PlayerId) -> bool {
        let mut waiting = self.waiting.lock();
        if waiting.as_ref().is_some_and(|p| p.host.id == player_id) {
            *waiting = None;
            return true;
        }
        false
    }
}
