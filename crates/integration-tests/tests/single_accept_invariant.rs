//! Random interleavings of offer decisions never engage more than one offer per request.

use futures_util::future::join_all;
use integration_tests::World;
use ll_core::models::{NewOffer, OfferStatus, RequestStatus};
use ll_core::workflow::Workflow;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Submit(usize),
    Accept(usize),
    Reject(usize),
    Complete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize).prop_map(Op::Submit),
        (0..8usize).prop_map(Op::Accept),
        (0..8usize).prop_map(Op::Reject),
        (0..8usize).prop_map(Op::Complete),
    ]
}

/// Everything one spawned operation needs, owned so it can cross threads.
#[derive(Clone)]
struct Scene {
    workflow: Workflow,
    request_id: String,
    requester_id: String,
    offerer_ids: Vec<String>,
    offer_ids: Vec<String>,
}

impl Scene {
    fn pick(&self, i: usize) -> Option<String> {
        if self.offer_ids.is_empty() {
            return None;
        }
        Some(self.offer_ids[i % self.offer_ids.len()].clone())
    }

    /// Runs `op` and returns the offer it touched when it succeeded.
    async fn apply(self, op: Op) -> Option<String> {
        let workflow = &self.workflow;
        match op {
            Op::Submit(who) => workflow
                .submit_offer(
                    &self.request_id,
                    &self.offerer_ids[who],
                    NewOffer {
                        message: "can do Tuesday".into(),
                        price: 10.0 * (who as f64 + 1.0),
                    },
                )
                .await
                .ok()
                .map(|o| o.id),
            Op::Accept(i) => {
                let id = self.pick(i)?;
                workflow.accept_offer(&id, &self.requester_id).await.ok().map(|_| id)
            }
            Op::Reject(i) => {
                let id = self.pick(i)?;
                workflow.reject_offer(&id, &self.requester_id).await.ok().map(|_| id)
            }
            Op::Complete(i) => {
                let id = self.pick(i)?;
                workflow.mark_completed(&id, &self.requester_id).await.ok().map(|_| id)
            }
        }
    }
}

async fn run_batches(batches: Vec<Vec<Op>>) -> anyhow::Result<()> {
    let world = World::interleaved();
    let requester = world.user("Ravi").await?;
    let mut offerer_ids = Vec::new();
    for name in ["Amara", "Bo", "Chen"] {
        offerer_ids.push(world.user(name).await?.id);
    }
    let request = world.request(&requester, None).await?;
    let mut scene = Scene {
        workflow: world.market.workflow.clone(),
        request_id: request.id.clone(),
        requester_id: requester.id.clone(),
        offerer_ids,
        offer_ids: Vec::new(),
    };

    for batch in batches {
        let handles = batch
            .iter()
            .cloned()
            .map(|op| tokio::spawn(scene.clone().apply(op)));
        let results = join_all(handles).await;

        for (op, outcome) in batch.iter().zip(results) {
            if let (Op::Submit(_), Some(id)) = (op, outcome?) {
                scene.offer_ids.push(id);
            }
        }

        let workflow = &scene.workflow;
        let offers = workflow.offers_for_request(&request.id).await?;
        let engaged: Vec<_> = offers.iter().filter(|o| o.status.is_engaged()).collect();
        assert!(engaged.len() <= 1, "engaged offers: {engaged:?}");

        let current = workflow.get_request(&request.id).await?;
        match engaged.first() {
            Some(offer) => {
                assert_ne!(current.status, RequestStatus::Pending);
                assert_eq!(current.accepted_offer_id.as_deref(), Some(offer.id.as_str()));
                if offer.status == OfferStatus::Completed {
                    assert_eq!(current.status, RequestStatus::Fulfilled);
                }
            }
            None => {
                assert_eq!(current.status, RequestStatus::Pending);
                assert_eq!(current.accepted_offer_id, None);
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn at_most_one_offer_is_ever_engaged(
        batches in prop::collection::vec(prop::collection::vec(op(), 1..6), 1..6)
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .expect("test runtime");
        let outcome = runtime.block_on(run_batches(batches));
        prop_assert!(outcome.is_ok(), "{outcome:?}");
    }
}
