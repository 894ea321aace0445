pub mod irq;
pub mod irq_spinlock;
pub use irq_spinlock::IrqSpinLock;
pub mod rwlock;
pub use rwlock::RwLock;
