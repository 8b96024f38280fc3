//! Synchronized-field слой: явная сериализация + diffing вместо
//! engine reflection
//!
//! Каждое replicated поле описывается дескриптором:
//! - visibility class: кто видит значение (owner-only / skip-owner / все)
//! - transport class: reliable или unreliable latest-value-wins
//! - change notification: observer-side callback на изменение
//!
//! Diffing построен на равенстве снапшотов. Два value-identical попадания
//! подряд generic equality-слой склеил бы — для этого существует
//! `ReplicationNonce`: байт, инкрементируемый на каждую запись.

use serde::{Deserialize, Serialize};

/// Кому реплицируется поле
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncVisibility {
    /// Все хосты (health, take-hit record)
    Everyone,
    /// Только владеющий клиент (точные ammo counters)
    OwnerOnly,
    /// Все кроме владельца — он уже знает своё состояние (burst, reload flag)
    SkipOwner,
}

/// Транспортный класс поля
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTransport {
    /// Гарантированная доставка (ammo, ownership)
    Reliable,
    /// Latest-value-wins, потери допустимы (cosmetic burst counter)
    UnreliableLatest,
}

/// С чьей точки зрения поле читается
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Владеющий клиент
    Owner,
    /// Посторонний наблюдатель
    Observer,
}

/// Дескриптор одного synchronized поля
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub visibility: SyncVisibility,
    pub transport: SyncTransport,
}

impl FieldDescriptor {
    pub const fn new(
        name: &'static str,
        visibility: SyncVisibility,
        transport: SyncTransport,
    ) -> Self {
        Self {
            name,
            visibility,
            transport,
        }
    }

    /// Видно ли поле данному viewer'у
    pub fn visible_to(&self, viewer: Viewer) -> bool {
        match self.visibility {
            SyncVisibility::Everyone => true,
            SyncVisibility::OwnerOnly => viewer == Viewer::Owner,
            SyncVisibility::SkipOwner => viewer == Viewer::Observer,
        }
    }
}

/// Diffing-ячейка: хранит последний отправленный снапшот и отдаёт
/// изменение ровно один раз (change notification semantics).
#[derive(Debug, Clone)]
pub struct Replicated<T: Clone + PartialEq> {
    acked: Option<T>,
}

// Ручной impl: derive потребовал бы T: Default, который снапшотам не нужен
impl<T: Clone + PartialEq> Default for Replicated<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new() -> Self {
        Self { acked: None }
    }

    /// Сравнивает текущее значение с последним отправленным.
    /// Возвращает Some(новое) если поле изменилось (или ещё не посылалось).
    pub fn diff(&mut self, current: &T) -> Option<T> {
        match &self.acked {
            Some(acked) if acked == current => None,
            _ => {
                self.acked = Some(current.clone());
                Some(current.clone())
            }
        }
    }

    /// Последнее реплицированное значение (для observer fallback логики)
    pub fn last(&self) -> Option<&T> {
        self.acked.as_ref()
    }
}

/// Байт принудительной репликации: инкремент на каждую запись записи,
/// чтобы equality-based diffing не съел второе value-identical попадание.
/// Wrapping — переполнение это нормальный режим работы.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationNonce(pub u8);

impl ReplicationNonce {
    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}
