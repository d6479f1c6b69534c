mod entity;
mod registry;

pub use entity::{
    Entity, EntityHandle, EntityType, Equipment, Health, InventorySlot, POS_CHANGE_THRESHOLD,
};
pub use registry::{EntityRegistry, RegistryError};
