use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, TransferCreditedEvent, TransferDetectedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub transfer_detected_producer: Vec<EventProducer<TransferDetectedEvent>>,
    pub transfer_credited_producer: Vec<EventProducer<TransferCreditedEvent>>,
}

pub struct EventHandlers {
    pub on_transfer_detected: Option<EventHandler<TransferDetectedEvent>>,
    pub on_transfer_credited: Option<EventHandler<TransferCreditedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_transfer_detected = hooks.on_transfer_detected.map(|f| EventHandler::new(buffer_size, f));
        let on_transfer_credited = hooks.on_transfer_credited.map(|f| EventHandler::new(buffer_size, f));
        Self { on_transfer_detected, on_transfer_credited }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_transfer_detected {
            result.transfer_detected_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_transfer_credited {
            result.transfer_credited_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_transfer_detected {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_transfer_credited {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_transfer_detected: Option<Handler<TransferDetectedEvent>>,
    pub on_transfer_credited: Option<Handler<TransferCreditedEvent>>,
}

impl EventHooks {
    pub fn on_transfer_detected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TransferDetectedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_transfer_detected = Some(Arc::new(f));
        self
    }

    pub fn on_transfer_credited<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TransferCreditedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_transfer_credited = Some(Arc::new(f));
        self
    }
}
