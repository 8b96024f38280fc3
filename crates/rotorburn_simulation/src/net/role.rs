//! Сетевая авторитетность: кто владеет истиной по entity
//!
//! Модель: один логический authority на simulated world. Остальные хосты
//! рендерят synchronized копию. Никакого shared-memory между хостами —
//! каждый World представляет ровно один хост.

use bevy::prelude::*;

/// Режим хоста (host-global, поэтому Resource)
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetMode {
    /// Авторитетный хост без презентации (cosmetic эффекты пропускаются)
    DedicatedServer,
    /// Авторитетный хост, который одновременно визуальный клиент
    ListenServer,
    /// Чистый remote клиент (prediction + replicated копии)
    Client,
}

/// Контекст хоста, на котором выполняется симуляция
#[derive(Resource, Debug, Clone, Copy)]
pub struct HostContext {
    pub net_mode: NetMode,
}

impl HostContext {
    pub fn new(net_mode: NetMode) -> Self {
        Self { net_mode }
    }

    /// Authority хост принимает canonical решения (урон, спавн, ammo grant)
    pub fn is_authority(&self) -> bool {
        self.net_mode != NetMode::Client
    }

    /// На dedicated server нет презентации — cosmetic эффекты не проигрываем
    pub fn is_dedicated_server(&self) -> bool {
        self.net_mode == NetMode::DedicatedServer
    }
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new(NetMode::ListenServer)
    }
}

/// Роль entity на ЭТОМ хосте
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
#[reflect(Component)]
pub enum NetRole {
    /// Симуляция entity на этом хосте canonical
    Authority,
    /// Локально управляемая копия (client prediction)
    AutonomousProxy,
    /// Пассивная synchronized копия (observer)
    #[default]
    SimulatedProxy,
}

/// Маркер: authority над entity передан клиенту (вокруг смерти),
/// чтобы труп двигался/анимировался локально без server correction.
/// Ставится один раз, не снимается.
#[derive(Component, Debug, Default)]
pub struct TornOff;

/// Маркер: этим entity управляет локальный игрок этого хоста
#[derive(Component, Debug, Default)]
pub struct LocallyControlled;

/// Гейт "кому засчитывать урон" — структурная защита от double-authority:
/// listen server и remote клиент не должны оба независимо зарегистрировать
/// одно и то же попадание.
///
/// Урон засчитывается если:
/// - хост не чистый клиент, ИЛИ
/// - цель авторитетна на этом хосте, ИЛИ
/// - цель уже torn-off (клиент получил authoritative control)
pub fn should_deal_damage(host: &HostContext, target_role: NetRole, torn_off: bool) -> bool {
    host.net_mode != NetMode::Client || target_role == NetRole::Authority || torn_off
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_hosts_deal_damage() {
        let listen = HostContext::new(NetMode::ListenServer);
        let dedicated = HostContext::new(NetMode::DedicatedServer);

        assert!(should_deal_damage(&listen, NetRole::SimulatedProxy, false));
        assert!(should_deal_damage(&dedicated, NetRole::SimulatedProxy, false));
    }

    #[test]
    fn test_pure_client_does_not_deal_damage() {
        let client = HostContext::new(NetMode::Client);

        assert!(!should_deal_damage(&client, NetRole::SimulatedProxy, false));
    }

    #[test]
    fn test_client_deals_damage_to_locally_authoritative_target() {
        let client = HostContext::new(NetMode::Client);

        assert!(should_deal_damage(&client, NetRole::Authority, false));
    }

    #[test]
    fn test_client_deals_damage_to_torn_off_target() {
        let client = HostContext::new(NetMode::Client);

        assert!(should_deal_damage(&client, NetRole::SimulatedProxy, true));
    }
}
