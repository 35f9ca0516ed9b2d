use std::alloc::Layout;
use strata::{AllocError, MultipoolAllocator, MultipoolConfig, RawAlloc};

#[test]
fn test_fifth_block_fails_until_one_is_returned() {
    let pool = MultipoolAllocator::new(4, 64, 1);
    let layout = Layout::from_size_align(64, 8).unwrap();

    let blocks: Vec<_> = (0..4).map(|_| pool.allocate(layout).unwrap()).collect();
    assert_eq!(pool.allocate(layout), Err(AllocError::Exhausted { size: 64 }));
    assert_eq!(pool.memory_usage(), 256);

    unsafe { pool.deallocate(blocks[2], layout) };
    let again = pool.allocate(layout).unwrap();
    assert_eq!(again, blocks[2]);
    assert_eq!(pool.allocation_count(), 4);

    for block in blocks.into_iter().filter(|&b| b != again).chain([again]) {
        unsafe { pool.deallocate(block, layout) };
    }
    assert_eq!(pool.allocation_count(), 0);
}

#[test]
fn test_levels_serve_their_own_sizes() {
    let pool = MultipoolAllocator::new(2, 256, 3);
    let stats = pool.depth_stats();
    let shape: Vec<_> = stats.iter().map(|s| (s.block_size, s.total_blocks)).collect();
    assert_eq!(shape, [(256, 2), (128, 4), (64, 8)]);

    let small = Layout::from_size_align(64, 16).unwrap();
    let ptr = pool.allocate(small).unwrap();
    assert_eq!(ptr.as_ptr() as usize % 16, 0);
    assert_eq!(pool.free_blocks(2), 7);
    assert_eq!(pool.free_blocks(0), 2);

    assert_eq!(
        pool.allocate(Layout::from_size_align(100, 8).unwrap()),
        Err(AllocError::NoSizeClass { size: 100 })
    );
    unsafe { pool.deallocate(ptr, small) };
    assert_eq!(pool.free_blocks(2), 8);
}

#[test]
fn test_reallocate_moves_between_levels() {
    let pool = MultipoolAllocator::new(1, 128, 2);
    let small = Layout::from_size_align(64, 8).unwrap();
    let large = Layout::from_size_align(128, 8).unwrap();

    let ptr = pool.allocate(small).unwrap();
    unsafe {
        ptr.as_ptr().write_bytes(0xAB, 64);
        let grown = pool.reallocate(ptr, small, large).unwrap();
        assert_eq!(*grown.as_ptr().add(63), 0xAB);
        assert_eq!(pool.free_blocks(1), 2);
        assert_eq!(pool.free_blocks(0), 0);
        pool.deallocate(grown, large);
    }
}

#[test]
fn test_clear_reclaims_outstanding_blocks() {
    let mut pool = MultipoolAllocator::new(3, 32, 1);
    let layout = Layout::from_size_align(32, 8).unwrap();
    for _ in 0..3 {
        pool.allocate(layout).unwrap();
    }
    assert!(!pool.can_allocate(layout));
    pool.clear();
    assert!(pool.can_allocate(layout));
    assert_eq!(pool.memory_usage(), 0);
}

#[test]
fn test_config_from_json() -> anyhow::Result<()> {
    let config = MultipoolConfig::from_json(r#"{"block_count": 8, "block_size": 512, "pool_depth": 4}"#)?;
    let pool = MultipoolAllocator::from_config(&config)?;
    assert_eq!(pool.pool_depth(), 4);
    assert_eq!(pool.max_size(), 512);
    assert_eq!(pool.depth_for_size(64), Some(3));

    let stats = serde_json::to_value(pool.depth_stats())?;
    assert_eq!(stats[3]["total_blocks"], 64);
    Ok(())
}

#[test]
fn test_config_errors_convert_to_crate_error() {
    let err = MultipoolConfig::from_json(r#"{"block_count": 1, "block_size": 4, "pool_depth": 4}"#)
        .map_err(strata::Error::from)
        .unwrap_err();
    assert!(err.to_string().contains("cannot be halved"), "{err}");

    let parse = MultipoolConfig::from_json("not json").unwrap_err();
    assert!(parse.to_string().starts_with("malformed multipool configuration"));
}
