use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use kinship_auth::{AccessPolicy, AuthGateway, Claims, Principal, Role, TokenManager};
use kinship_core::{FamilyId, UserId};
use kinship_infra::{InMemoryIdentityDirectory, InMemoryMembershipStore};
use kinship_membership::{FamilyStore, InviteService, InviteStore};
use tokio::runtime::Runtime;

const SECRET: &[u8] = b"bench-secret";

fn gateway() -> AuthGateway {
    let policy = AccessPolicy::builder()
        .allow("/family.Family/CreateFamily", &[Role::User, Role::Admin])
        .allow("/family.Invite/DeleteUserInvites", &[Role::Admin])
        .build()
        .unwrap();
    AuthGateway::new(Arc::new(policy), Arc::new(TokenManager::new(SECRET)))
}

fn bearer(role: Role) -> String {
    let token = TokenManager::new(SECRET)
        .issue(&Claims {
            user_id: UserId::new(7),
            role,
            email: "bench@example.com".to_string(),
            exp: None,
        })
        .unwrap();
    format!("Bearer {token}")
}

fn bench_gateway_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("gateway_admission");
    group.sample_size(1000);

    let gateway = gateway();
    let user = bearer(Role::User);

    group.bench_function("admit_allowed", |b| {
        b.iter(|| {
            gateway
                .admit(black_box("/family.Family/CreateFamily"), Some(black_box(user.as_str())))
                .unwrap()
        });
    });

    group.bench_function("reject_role", |b| {
        b.iter(|| {
            gateway
                .admit(black_box("/family.Invite/DeleteUserInvites"), Some(black_box(user.as_str())))
                .unwrap_err()
        });
    });

    group.bench_function("reject_unlisted_method", |b| {
        b.iter(|| gateway.admit(black_box("/family.Unknown/Call"), None).unwrap_err());
    });

    group.finish();
}

fn bench_store_membership_churn(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("store_membership_churn");

    for size in [1i64, 10, 100].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("fill_then_empty", size), size, |b, &size| {
            let store = InMemoryMembershipStore::new();
            b.iter(|| {
                rt.block_on(async {
                    let family = store.create(UserId::new(1)).await.unwrap();
                    for n in 2..=size {
                        store.add_member(family, UserId::new(n)).await.unwrap();
                    }
                    for n in 1..=size {
                        black_box(store.remove_member(family, UserId::new(n)).await.unwrap());
                    }
                })
            });
        });
    }

    group.finish();
}

fn bench_invite_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("invite_round_trip");

    group.bench_function("send_then_deny", |b| {
        let store = Arc::new(InMemoryMembershipStore::new());
        let directory = Arc::new(InMemoryIdentityDirectory::new());
        directory.register_user(UserId::new(2), "invitee@example.com");
        let service = InviteService::new(store.clone(), store.clone(), directory);
        let leader = Principal::new(UserId::new(1), Role::User, "leader@example.com");
        let invitee = Principal::new(UserId::new(2), Role::User, "invitee@example.com");
        let family: FamilyId = rt.block_on(store.create(leader.user_id)).unwrap();

        b.iter(|| {
            rt.block_on(async {
                let invite = service.send_invite(&leader, family, invitee.user_id).await.unwrap();
                service.deny_invite(&invitee, black_box(invite)).await.unwrap();
            })
        });
        assert_eq!(rt.block_on(store.list_for_user(invitee.user_id)).unwrap().len(), 0);
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_gateway_admission,
    bench_store_membership_churn,
    bench_invite_round_trip
);
criterion_main!(benches);
