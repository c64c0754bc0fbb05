//! Queue names, command names and pricing constants for the saga.

use std::time::Duration;

/// Queue this service consumes its own commands from.
pub const PAYMENT_QUEUE: &str = "q02";

/// Queue of the order service (compensation target).
pub const ORDER_QUEUE: &str = "q01";

/// Queue of the inventory service (next saga step).
pub const INVENTORY_QUEUE: &str = "q03";

/// Command name: run a payment saga step (`fn` selects pay/rollback).
pub const CMD_CREATE_PAYMENT: &str = "create_payment";

/// Command name: direct debit, independently addressable.
pub const CMD_COMMIT_PAYMENT: &str = "commit_payment";

/// Command name: direct compensating credit.
pub const CMD_ROLLBACK_PAYMENT: &str = "rollback_payment";

/// Command name consumed by the order service.
pub const CMD_CREATE_ORDER: &str = "create_order";

/// Command name consumed by the inventory service.
pub const CMD_UPDATE_INVENTORY: &str = "update_inventory";

/// Function selector: charge for a purchase.
pub const FN_PAY: &str = "pay";

/// Function selector: compensate a previously charged purchase.
pub const FN_ROLLBACK_PAYMENT: &str = "rollback_payment";

/// Function selector sent to the order service to undo an order.
pub const FN_ROLLBACK_ORDER: &str = "rollback_order";

/// Credit cost per unit of quantity.
pub const UNIT_PRICE: i64 = 10;

/// Default bounded wait for the downstream inventory result.
pub const DEFAULT_RESULT_WAIT: Duration = Duration::from_secs(2);
