//! 内存中的账户：昵称 -> 玩家 ID 和筹码余额。
//! 服务器重启后全部清空。

use dashmap::DashMap;
use holdem_duel_core::{BIG_BLIND, GameSession, PlayerId, SessionStatus};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub id: PlayerId,
    pub chips: u32,
}

pub struct Accounts {
    by_nickname: DashMap<String, Account>,
    nicknames: DashMap<PlayerId, String>,
    starting_chips: u32,
}

impl Accounts {
    pub fn new(starting_chips: u32) -> Self {
        Accounts { by_nickname: DashMap::new(), nicknames: DashMap::new(), starting_chips }
    }

    /// 按昵称登录，第一次出现的昵称会开一个新账户。
    /// 连大盲都付不起的账户会被补回初始筹码。
    pub fn login(&self, nickname: &str) -> Account {
        let mut entry = self.by_nickname.entry(nickname.to_string()).or_insert_with(|| {
            let account = Account { id: Uuid::new_v4(), chips: self.starting_chips };
            self.nicknames.insert(account.id, nickname.to_string());
            info!("新账户 {} ({})", nickname, account.id);
            account
        });

        if entry.chips < BIG_BLIND {
            info!("账户 {} 筹码不足，补充到 {}", nickname, self.starting_chips);
            entry.chips = self.starting_chips;
        }
        *entry
    }

    /// 牌局结束后把双方的最终筹码写回账户
    pub fn settle(&self, session: &GameSession) {
        if session.status != SessionStatus::Completed {
            return;
        }
        for player in &session.players {
            let Some(nickname) = self.nicknames.get(&player.id).map(|n| n.clone()) else {
                continue;
            };
            if let Some(mut account) = self.by_nickname.get_mut(&nickname) {
                account.chips = player.chips;
            }
        }
    }

    pub fn nickname(&self, player_id: PlayerId) -> String {
        self.nicknames.get(&player_id).map(|n| n.clone()).unwrap_or_else(|| "未知玩家".to_string())
    }

    pub fn chips(&self, player_id: PlayerId) -> Option<u32> {
        let nickname = self.nicknames.get(&player_id)?.clone();
        self.by_nickname.get(&nickname).map(|a| a.chips)
    }
}
