use eloom_dpu::buffers::{ItemState, RingBuffer};
use eloom_dpu::DpuError;
use std::sync::Arc;
use std::thread;

#[test]
fn test_ring_allocate_and_capacity() {
    let ring = RingBuffer::allocate(4, 16).unwrap();
    assert_eq!(ring.capacity(), 4);
    assert_eq!(ring.get_item_size(), 16);
    assert_eq!(ring.free_count(), 4);
    assert_eq!(ring.ready_count(), 0);
}

#[test]
fn test_ring_rejects_empty_sizes() {
    assert!(matches!(RingBuffer::allocate(0, 16), Err(DpuError::InvalidBufferSize { .. })));
    assert!(matches!(RingBuffer::allocate(4, 0), Err(DpuError::InvalidBufferSize { .. })));
}

#[test]
fn test_ring_single_filling_item() {
    let ring = RingBuffer::allocate(3, 8).unwrap();

    let item = ring.get_free_item_from_head().unwrap();
    assert_eq!(ring.item_state(item), ItemState::Filling);
    assert_eq!(ring.filling_item(), Some(item));
    assert!(matches!(ring.get_free_item_from_head(), Err(DpuError::ItemAlreadyFilling)));

    ring.set_item_ready(item).unwrap();
    assert_eq!(ring.filling_item(), None);
    assert!(ring.get_free_item_from_head().is_ok());
}

#[test]
fn test_ring_full_then_drained_in_order() {
    let ring = RingBuffer::allocate(3, 1).unwrap();

    for value in 0..3u8 {
        let item = ring.get_free_item_from_head().unwrap();
        ring.get_item_data(item)[0] = value;
        ring.set_item_ready(item).unwrap();
    }
    assert_eq!(ring.ready_count(), 3);
    assert!(matches!(ring.get_free_item_from_head(), Err(DpuError::NoFreeItem)));

    for expected in 0..3u8 {
        let item = ring.get_ready_item_from_tail().unwrap();
        assert_eq!(ring.get_item_data(item)[0], expected);
        ring.release_item(item).unwrap();
    }
    assert!(ring.get_ready_item_from_tail().is_none());
    assert_eq!(ring.free_count(), 3);
}

#[test]
fn test_ring_wraps_around() {
    let ring = RingBuffer::allocate(2, 1).unwrap();

    for round in 0..5 {
        let item = ring.get_free_item_from_head().unwrap();
        assert_eq!(item.index(), round % 2);
        ring.set_item_ready(item).unwrap();
        let ready = ring.get_ready_item_from_tail().unwrap();
        assert_eq!(ready, item);
        ring.release_item(ready).unwrap();
    }
}

#[test]
fn test_ring_release_requires_tail() {
    let ring = RingBuffer::allocate(3, 1).unwrap();

    let first = ring.get_free_item_from_head().unwrap();
    ring.set_item_ready(first).unwrap();
    let second = ring.get_free_item_from_head().unwrap();
    ring.set_item_ready(second).unwrap();

    assert!(matches!(ring.release_item(second), Err(DpuError::InvalidItem(_))));
    ring.release_item(first).unwrap();
    ring.release_item(second).unwrap();
}

#[test]
fn test_ring_set_ready_requires_filling() {
    let ring = RingBuffer::allocate(2, 1).unwrap();

    let item = ring.get_free_item_from_head().unwrap();
    ring.set_item_ready(item).unwrap();
    assert!(matches!(ring.set_item_ready(item), Err(DpuError::InvalidItem(_))));
}

#[test]
fn test_ring_init_discards_in_flight() {
    let ring = RingBuffer::allocate(3, 1).unwrap();

    let item = ring.get_free_item_from_head().unwrap();
    ring.set_item_ready(item).unwrap();
    ring.get_free_item_from_head().unwrap();

    ring.init();
    assert_eq!(ring.free_count(), 3);
    assert!(ring.get_ready_item_from_tail().is_none());
    assert_eq!(ring.get_free_item_from_head().unwrap().index(), 0);
}

#[test]
fn test_ring_producer_consumer_threads() {
    let ring = Arc::new(RingBuffer::allocate(4, 4).unwrap());
    let total = 200u32;

    let producer = {
        let ring = ring.clone();
        thread::spawn(move || {
            let mut next = 0u32;
            while next < total {
                match ring.get_free_item_from_head() {
                    Ok(item) => {
                        ring.get_item_data(item).copy_from_slice(&next.to_ne_bytes());
                        ring.set_item_ready(item).unwrap();
                        next += 1;
                    }
                    Err(_) => thread::yield_now(),
                }
            }
        })
    };

    let mut received = Vec::new();
    while received.len() < total as usize {
        match ring.get_ready_item_from_tail() {
            Some(item) => {
                let bytes: [u8; 4] = ring.get_item_data(item)[..].try_into().unwrap();
                received.push(u32::from_ne_bytes(bytes));
                ring.release_item(item).unwrap();
            }
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();

    assert_eq!(received, (0..total).collect::<Vec<_>>());
}
