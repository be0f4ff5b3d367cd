// Communication channels lock-free

use crate::pads::engine::TriggerRequest;
use crate::sequencer::transport::TransportEvent;
use ringbuf::{HeapRb, traits::Split};

pub type TriggerProducer = ringbuf::HeapProd<TriggerRequest>;
pub type TriggerConsumer = ringbuf::HeapCons<TriggerRequest>;

/// Control thread → audio thread
pub fn create_trigger_channel(capacity: usize) -> (TriggerProducer, TriggerConsumer) {
    let rb = HeapRb::<TriggerRequest>::new(capacity);
    rb.split()
}

pub type EventProducer = ringbuf::HeapProd<TransportEvent>;
pub type EventConsumer = ringbuf::HeapCons<TransportEvent>;

/// Transport → UI
pub fn create_event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let rb = HeapRb::<TransportEvent>::new(capacity);
    rb.split()
}
