use ibdhmm::dispatch::*;
use ibdhmm::hmm::{CoancestryDecay, IbdHmm, Parameters, Sequence};
use ibdhmm::optim::GridSearch;
use ibdhmm::DispatchError;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::sync::mpsc::channel;
use std::sync::{Arc, Barrier, Mutex};
const SEED: u64 = 1293890;

fn pairs(num: usize, length: usize) -> Vec<Arc<Sequence>> {
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(SEED);
    let truth = Parameters::new(0.3, 0.1);
    let kernel = CoancestryDecay::default();
    (0..num)
        .map(|_| {
            let pair = ibdhmm::gen_seq::simulate_pair(
                &mut rng,
                length,
                &truth,
                &kernel,
                &ibdhmm::gen_seq::PROFILE,
            );
            Arc::new(pair.sequence)
        })
        .collect()
}

fn dispatcher(threads: usize, capacity: usize) -> Dispatcher<WorkerPool> {
    let pool = WorkerPool::new(&PoolConfig::new(threads, capacity));
    Dispatcher::new(pool, IbdHmm::new(), Arc::new(GridSearch::new(4, 2)))
}

#[test]
fn many_pairs_on_pool() {
    let dispatcher = dispatcher(4, 1024);
    let pairs = pairs(8, 300);
    let params = Arc::new(Mutex::new(Parameters::new(0.3, 0.1)));
    let (tx, rx) = channel();
    for (id, pair) in pairs.iter().enumerate() {
        for code in 1..=3 {
            dispatcher
                .submit_task(code, id, pair.clone(), &params, tx.clone())
                .unwrap();
        }
    }
    drop(tx);
    let mut forward = vec![None; pairs.len()];
    let mut backward = vec![None; pairs.len()];
    let mut viterbi = 0;
    for Completed { id, output } in rx.iter() {
        match output.unwrap() {
            TaskOutput::Forward { lk, .. } => forward[id] = Some(lk),
            TaskOutput::Backward { lk, .. } => backward[id] = Some(lk),
            TaskOutput::Viterbi { path, .. } => {
                assert_eq!(path.len(), 301);
                viterbi += 1;
            }
            TaskOutput::Optimize { .. } => panic!(),
        }
    }
    dispatcher.executor().join().unwrap();
    assert_eq!(viterbi, pairs.len());
    let hmm = IbdHmm::new();
    for (id, pair) in pairs.iter().enumerate() {
        let (fw, bw) = (forward[id].unwrap(), backward[id].unwrap());
        assert!((fw - bw).abs() < 1e-9 * fw.abs(), "{},{}", fw, bw);
        let (_, expected) = hmm.forward(pair, &Parameters::new(0.3, 0.1));
        assert_eq!(fw, expected);
    }
}

#[test]
fn optimize_on_pool() {
    let dispatcher = dispatcher(2, 16);
    let pairs = pairs(3, 1_000);
    let params: Vec<_> = (0..3)
        .map(|_| Arc::new(Mutex::new(Parameters::new(0.5, 0.5))))
        .collect();
    let (tx, rx) = channel();
    for (id, (pair, params)) in pairs.iter().zip(params.iter()).enumerate() {
        dispatcher
            .submit_task(4, id, pair.clone(), params, tx.clone())
            .unwrap();
    }
    drop(tx);
    let results: Vec<_> = rx.iter().collect();
    assert_eq!(results.len(), 3);
    dispatcher.executor().shutdown().unwrap();
    for Completed { id, output } in results {
        match output {
            Ok(TaskOutput::Optimize { params: fitted }) => {
                assert_eq!(*params[id].lock().unwrap(), fitted);
                assert!((0f64..=1f64).contains(&fitted.f));
                assert!((0f64..=1f64).contains(&fitted.aa));
            }
            x => panic!("{:?}", x),
        }
    }
}

#[test]
fn shutting_down_pool_rejects() {
    let dispatcher = dispatcher(2, 16);
    dispatcher.executor().shutdown().unwrap();
    let init = Parameters::new(0.5, 0.5);
    let params = Arc::new(Mutex::new(init));
    let (tx, rx) = channel();
    let pair = pairs(1, 10).pop().unwrap();
    let result = dispatcher.submit_task(4, 0, pair, &params, tx);
    assert_eq!(result, Err(DispatchError::ShuttingDown));
    assert!(rx.recv().is_err());
    assert_eq!(*params.lock().unwrap(), init);
}

#[test]
fn full_queue_rejects() {
    let pool = WorkerPool::new(&PoolConfig::new(1, 2));
    // Block the only worker until the queue is filled.
    let barrier = Arc::new(Barrier::new(2));
    let blocker = barrier.clone();
    pool.execute(Box::new(move || {
        blocker.wait();
    }))
    .unwrap();
    pool.execute(Box::new(|| {})).unwrap();
    assert_eq!(pool.execute(Box::new(|| {})), Err(DispatchError::QueueFull));
    barrier.wait();
    pool.join().unwrap();
    // Slots are released after the jobs finished.
    pool.execute(Box::new(|| {})).unwrap();
    pool.shutdown().unwrap();
}

#[test]
fn panicked_worker_is_fatal() {
    let pool = WorkerPool::new(&PoolConfig::new(1, 4));
    pool.execute(Box::new(|| panic!("worker failure"))).unwrap();
    assert_eq!(pool.join(), Err(DispatchError::WorkerFailure));
    assert_eq!(
        pool.execute(Box::new(|| {})),
        Err(DispatchError::WorkerFailure)
    );
}
