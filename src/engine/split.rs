use std::ops::Range;

use crate::constants::MIN_CLIENTS_FOR_SPLIT;

/// Client ranges handed to each steady state activity.
///
/// With more than [`MIN_CLIENTS_FOR_SPLIT`] clients and level churn or
/// watches active, reads and value churn get one client each and the rest
/// is divided between level churn and watches, level churn taking the odd
/// client. Otherwise every activity shares the whole pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSplit {
    pub get: Range<usize>,
    pub value_churn: Range<usize>,
    pub level_churn: Range<usize>,
    pub watch: Range<usize>,
}

/// Which activities run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveSet {
    pub get: bool,
    pub value_churn: bool,
    pub level_churn: bool,
    pub watch: bool,
}

impl ClientSplit {
    pub fn plan(
        clients: usize,
        active: ActiveSet,
    ) -> Self {
        if clients <= MIN_CLIENTS_FOR_SPLIT || !(active.level_churn || active.watch) {
            return Self {
                get: 0..clients,
                value_churn: 0..clients,
                level_churn: 0..clients,
                watch: 0..clients,
            };
        }

        let mut next = 0;
        let mut take_one = |enabled: bool| {
            if enabled {
                next += 1;
                next - 1..next
            } else {
                0..0
            }
        };
        let get = take_one(active.get);
        let value_churn = take_one(active.value_churn);

        let rest = clients - next;
        let (level_churn, watch) = match (active.level_churn, active.watch) {
            (true, true) => {
                let level = rest - rest / 2;
                (next..next + level, next + level..clients)
            }
            (true, false) => (next..clients, 0..0),
            _ => (0..0, next..clients),
        };

        Self {
            get,
            value_churn,
            level_churn,
            watch,
        }
    }
}
