use common::{RequestId, Username};
use dispatch::TaskMessage;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::routes;

/// The unit of work flowing through the saga.
///
/// `request_id` identifies one purchase across redeliveries; a message
/// arriving without one is treated as a fresh purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub request_id: RequestId,
    pub username: Username,
    pub quantity: u32,
    /// Forwarded opaquely to downstream services; not interpreted here.
    pub delivery: bool,
}

impl PurchaseRequest {
    /// Creates a request with a fresh request ID.
    pub fn new(username: Username, quantity: u32, delivery: bool) -> Self {
        Self {
            request_id: RequestId::new(),
            username,
            quantity,
            delivery,
        }
    }

    /// Credit cost of this purchase.
    pub fn cost(&self) -> i64 {
        i64::from(self.quantity) * routes::UNIT_PRICE
    }

    /// Rejects requests no collaborator legitimately produces. The
    /// username is already enforced non-empty at deserialization.
    fn validated(self) -> Result<Self> {
        use serde::de::Error as _;

        if self.quantity == 0 {
            return Err(PaymentError::InvalidPayload(serde_json::Error::custom(
                "quantity must be positive",
            )));
        }
        Ok(self)
    }
}

/// Wire shape of a `create_payment` message: the purchase payload plus
/// a function selector, matching what collaborators send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandArgs {
    pub payload: PurchaseRequest,
    #[serde(rename = "fn")]
    pub function: String,
}

/// A parsed command for this participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCommand {
    /// Run the full pay step: check, debit, forward to inventory.
    Pay(PurchaseRequest),
    /// Direct unconditional debit.
    Commit(PurchaseRequest),
    /// Compensate: credit back and undo the order.
    Rollback(PurchaseRequest),
}

impl PaymentCommand {
    /// Parses a queued task message into a command.
    ///
    /// `create_payment` carries a `fn` selector choosing pay or
    /// rollback; `commit_payment` and `rollback_payment` address the
    /// ledger operations directly. Anything else is `UnknownCommand`.
    pub fn from_message(message: &TaskMessage) -> Result<Self> {
        match message.command.as_str() {
            routes::CMD_CREATE_PAYMENT => {
                let args: CommandArgs = serde_json::from_value(message.payload.clone())?;
                let request = args.payload.validated()?;
                match args.function.as_str() {
                    routes::FN_PAY => Ok(PaymentCommand::Pay(request)),
                    routes::FN_ROLLBACK_PAYMENT => Ok(PaymentCommand::Rollback(request)),
                    other => Err(PaymentError::UnknownCommand(format!(
                        "{}/{}",
                        routes::CMD_CREATE_PAYMENT,
                        other
                    ))),
                }
            }
            routes::CMD_COMMIT_PAYMENT => {
                let request: PurchaseRequest = serde_json::from_value(message.payload.clone())?;
                Ok(PaymentCommand::Commit(request.validated()?))
            }
            routes::CMD_ROLLBACK_PAYMENT => {
                let request: PurchaseRequest = serde_json::from_value(message.payload.clone())?;
                Ok(PaymentCommand::Rollback(request.validated()?))
            }
            other => Err(PaymentError::UnknownCommand(other.to_string())),
        }
    }

    /// The purchase request carried by the command.
    pub fn request(&self) -> &PurchaseRequest {
        match self {
            PaymentCommand::Pay(r) | PaymentCommand::Commit(r) | PaymentCommand::Rollback(r) => r,
        }
    }
}
