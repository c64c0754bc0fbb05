//! The payment coordinator: receives commands, drives the ledger and
//! emits the next saga step.

use std::time::Duration;

use async_trait::async_trait;
use dispatch::{CommandHandler, HandlerError, TaskDispatcher, TaskMessage};
use ledger::{DebitOutcome, LedgerError, LedgerStore};
use serde_json::json;

use crate::command::{PaymentCommand, PurchaseRequest};
use crate::error::Result;
use crate::outcome::SagaOutcome;
use crate::routes;
use crate::state::PurchasePhase;

/// Payment participant in the order-fulfillment saga.
///
/// Stateless: every purchase is re-derived from its incoming message.
/// The ledger and dispatcher are injected at construction; each
/// operation acquires and releases its own storage resources.
pub struct PaymentParticipant<L, D>
where
    L: LedgerStore,
    D: TaskDispatcher,
{
    ledger: L,
    dispatcher: D,
    result_wait: Duration,
}

impl<L, D> PaymentParticipant<L, D>
where
    L: LedgerStore,
    D: TaskDispatcher,
{
    /// Creates a new participant with the default result wait.
    pub fn new(ledger: L, dispatcher: D) -> Self {
        Self {
            ledger,
            dispatcher,
            result_wait: routes::DEFAULT_RESULT_WAIT,
        }
    }

    /// Sets how long a `pay` command waits for the inventory result.
    pub fn with_result_wait(mut self, wait: Duration) -> Self {
        self.result_wait = wait;
        self
    }

    /// Handles one queued message for this participant.
    ///
    /// Returns the outcome for commands that produce one (`pay`);
    /// compensations and direct debits are fire-and-forget.
    pub async fn handle_message(&self, message: &TaskMessage) -> Result<Option<SagaOutcome>> {
        match PaymentCommand::from_message(message)? {
            PaymentCommand::Pay(request) => Ok(Some(self.pay(request).await?)),
            PaymentCommand::Commit(request) => {
                self.commit(request).await?;
                Ok(None)
            }
            PaymentCommand::Rollback(request) => {
                self.rollback(request).await?;
                Ok(None)
            }
        }
    }

    /// Runs the pay step of the saga.
    ///
    /// Ensures the account, debits the cost if the balance covers it,
    /// and forwards the purchase to the inventory service, bridging
    /// its result back with a bounded wait. On insufficient funds the
    /// ledger is untouched and the order step is compensated instead.
    #[tracing::instrument(
        skip(self, request),
        fields(username = %request.username, request_id = %request.request_id)
    )]
    pub async fn pay(&self, request: PurchaseRequest) -> Result<SagaOutcome> {
        metrics::counter!("payments_total").increment(1);
        let started = std::time::Instant::now();
        let cost = request.cost();

        let outcome = match self.ledger.ensure_account(&request.username).await {
            Err(e) => self.ledger_unavailable(e),
            Ok(account) => {
                tracing::debug!(
                    phase = %PurchasePhase::AccountEnsured,
                    balance = account.balance,
                    cost,
                    "account ensured"
                );

                match self
                    .ledger
                    .try_debit(&request.username, cost, request.request_id)
                    .await
                {
                    Err(e) => self.ledger_unavailable(e),
                    Ok(DebitOutcome::Insufficient { balance }) => {
                        metrics::counter!("payments_insufficient_total").increment(1);
                        tracing::info!(
                            phase = %PurchasePhase::Insufficient,
                            balance,
                            cost,
                            "insufficient credit, compensating order"
                        );
                        self.dispatch_order_rollback(&request).await?;
                        SagaOutcome::InsufficientFunds
                    }
                    Ok(applied) => {
                        if let DebitOutcome::Duplicate { balance } = applied {
                            tracing::warn!(balance, "duplicate delivery, debit already applied");
                        }
                        tracing::debug!(
                            phase = %PurchasePhase::Debited,
                            balance = applied.balance(),
                            "cost debited"
                        );

                        let handle = self
                            .dispatcher
                            .send(
                                routes::INVENTORY_QUEUE,
                                routes::CMD_UPDATE_INVENTORY,
                                serde_json::to_value(&request)?,
                            )
                            .await?;
                        tracing::debug!(
                            phase = %PurchasePhase::AwaitingResult,
                            "inventory dispatched"
                        );

                        match handle.wait_for_result(self.result_wait).await {
                            Some(result) => SagaOutcome::Resolved { result },
                            None => SagaOutcome::StillRunning,
                        }
                    }
                }
            }
        };

        metrics::histogram!("payment_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(outcome = %outcome, "pay command finished");
        Ok(outcome)
    }

    /// Direct unconditional debit of the purchase cost.
    ///
    /// The caller is responsible for affordability; used as the
    /// sub-step of `pay` equivalents and independently addressable as
    /// `commit_payment`. Returns the balance after the debit.
    #[tracing::instrument(
        skip(self, request),
        fields(username = %request.username, request_id = %request.request_id)
    )]
    pub async fn commit(&self, request: PurchaseRequest) -> Result<i64> {
        let balance = self
            .ledger
            .debit(&request.username, request.cost(), request.request_id)
            .await?;
        tracing::info!(balance, "payment committed");
        Ok(balance)
    }

    /// Compensates a previously assumed debit: credits the cost back
    /// and dispatches an order rollback. Fire-and-forget; no value is
    /// returned to a waiting caller.
    #[tracing::instrument(
        skip(self, request),
        fields(username = %request.username, request_id = %request.request_id)
    )]
    pub async fn rollback(&self, request: PurchaseRequest) -> Result<()> {
        let balance = self
            .ledger
            .credit(&request.username, request.cost(), request.request_id)
            .await?;
        tracing::debug!(phase = %PurchasePhase::CreditedBack, balance, "credit restored");

        self.dispatch_order_rollback(&request).await?;

        metrics::counter!("payments_rolled_back_total").increment(1);
        tracing::info!(
            phase = %PurchasePhase::CompensationDispatched,
            balance,
            "payment rolled back"
        );
        Ok(())
    }

    /// Emits the compensating command for the order step, carrying the
    /// original payload.
    async fn dispatch_order_rollback(&self, request: &PurchaseRequest) -> Result<()> {
        self.dispatcher
            .send(
                routes::ORDER_QUEUE,
                routes::CMD_CREATE_ORDER,
                json!({
                    "payload": request,
                    "fn": routes::FN_ROLLBACK_ORDER,
                }),
            )
            .await?;
        Ok(())
    }

    fn ledger_unavailable(&self, error: LedgerError) -> SagaOutcome {
        metrics::counter!("ledger_unavailable_total").increment(1);
        tracing::error!(error = %error, "ledger unavailable, purchase outcome unknown");
        SagaOutcome::LedgerUnavailable
    }
}

#[async_trait]
impl<L, D> CommandHandler for PaymentParticipant<L, D>
where
    L: LedgerStore,
    D: TaskDispatcher,
{
    async fn handle(
        &self,
        message: TaskMessage,
    ) -> std::result::Result<Option<serde_json::Value>, HandlerError> {
        match self.handle_message(&message).await? {
            Some(outcome) => Ok(Some(serde_json::to_value(&outcome)?)),
            None => Ok(None),
        }
    }
}
