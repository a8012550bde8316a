use rstest::rstest;
use sugars::boxed;

use dslab_vmsched::job::{Job, JobStatus};
use dslab_vmsched::job_scheduler::{job_scheduler_resolver, JobScheduler};
use dslab_vmsched::utilization_model::{ConstantUtilizationModel, FullUtilizationModel};
use dslab_vmsched::Environment;

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(
        (x - y).abs() < eps || (x.max(y) - x.min(y)) / x.min(y) < eps,
        "Values do not match: {:.15} vs {:.15}",
        x,
        y
    );
}

fn job(id: u64, length: u64, slots: u32) -> Job {
    let mut job = Job::new(id, length, slots).unwrap();
    job.set_machine_parameter(0, "m0", 2.);
    job
}

fn scheduler(env: &Environment, policy: &str, mips: f64, slots: u32) -> Box<dyn JobScheduler> {
    job_scheduler_resolver(policy, env.create_context("vm-0"), mips, slots).unwrap()
}

#[rstest]
#[case("TimeShared")]
#[case("SpaceShared")]
#[case("SingleServiceWorkload")]
fn single_job_finishes_at_estimated_time(#[case] policy: &str) {
    let env = Environment::new(0.1);
    let mut scheduler = scheduler(&env, policy, 1000., 1);
    assert_eq!(scheduler.update_vm_processing(0., &[1000.]), 0.);

    assert_float_eq(scheduler.submit(job(0, 10_000, 1), 0.), 10., 1e-12);
    assert_eq!(scheduler.status(0), Some(JobStatus::InExec));

    env.set_time(10.);
    assert_eq!(scheduler.update_vm_processing(10., &[1000.]), 0.);
    assert_eq!(scheduler.status(0), Some(JobStatus::Success));
    assert!(scheduler.has_finished_jobs());
    let finished = scheduler.take_next_finished_job().unwrap();
    assert_eq!(finished.finished_so_far(), 10_000);
    assert_eq!(finished.finish_time(), Some(10.));
    assert_float_eq(finished.actual_cpu_time(), 10., 1e-12);
    assert_float_eq(finished.processing_cost(), 20., 1e-12);
    assert!(!scheduler.has_finished_jobs());
}

#[rstest]
#[case("TimeShared")]
#[case("SpaceShared")]
#[case("SingleServiceWorkload")]
fn progress_never_decreases(#[case] policy: &str) {
    let env = Environment::new(0.1);
    let mut scheduler = scheduler(&env, policy, 1000., 1);
    scheduler.update_vm_processing(0., &[1000.]);
    scheduler.submit(job(0, 10_000, 1), 0.);

    let shares: [&[f64]; 6] = [&[1000.], &[], &[400.], &[], &[], &[1000.]];
    let mut previous = 0;
    for (tick, share) in shares.iter().enumerate() {
        let time = (tick + 1) as f64;
        env.set_time(time);
        scheduler.update_vm_processing(time, share);
        let finished = scheduler.queues().find(0).unwrap().finished_so_far();
        assert!(finished >= previous);
        if share.is_empty() {
            assert_eq!(finished, previous);
        }
        previous = finished;
    }
    // 2400 MI granted in total
    assert_eq!(scheduler.queues().find(0).unwrap().remaining_length(), 7_600);
    assert_eq!(scheduler.previous_time(), 6.);
}

#[test]
fn space_shared_queues_job_until_slot_is_vacated() {
    let env = Environment::new(0.1);
    let mut scheduler = scheduler(&env, "SpaceShared", 1000., 1);
    scheduler.update_vm_processing(0., &[1000.]);

    assert!(scheduler.submit(job(0, 10_000, 1), 0.) > 0.);
    assert_eq!(scheduler.submit(job(1, 10_000, 1), 0.), 0.);
    assert_eq!(scheduler.status(1), Some(JobStatus::Queued));
    assert_eq!(scheduler.running_jobs(), 1);

    env.set_time(5.);
    assert_float_eq(scheduler.update_vm_processing(5., &[1000.]), 10., 1e-12);
    assert_eq!(scheduler.status(1), Some(JobStatus::Queued));

    env.set_time(10.);
    assert_float_eq(scheduler.update_vm_processing(10., &[1000.]), 20., 1e-12);
    assert_eq!(scheduler.status(0), Some(JobStatus::Success));
    assert_eq!(scheduler.status(1), Some(JobStatus::InExec));

    env.set_time(20.);
    assert_eq!(scheduler.update_vm_processing(20., &[1000.]), 0.);
    scheduler.take_next_finished_job().unwrap();
    let second = scheduler.take_next_finished_job().unwrap();
    assert_eq!(second.id(), 1);
    assert_eq!(second.finished_so_far(), 10_000);
    assert_float_eq(second.waiting_time(), 10., 1e-12);
    assert_float_eq(second.actual_cpu_time(), 10., 1e-12);
    assert_float_eq(second.wall_clock_time(), 20., 1e-12);
}

#[test]
fn time_shared_jobs_share_slot() {
    let env = Environment::new(0.1);
    let mut scheduler = scheduler(&env, "TimeShared", 1000., 1);
    scheduler.update_vm_processing(0., &[1000.]);

    assert_float_eq(scheduler.submit(job(0, 10_000, 1), 0.), 10., 1e-12);
    // two jobs on one slot, each gets half
    assert_float_eq(scheduler.submit(job(1, 5_000, 1), 0.), 10., 1e-12);

    env.set_time(10.);
    assert_float_eq(scheduler.update_vm_processing(10., &[1000.]), 15., 1e-12);
    assert_eq!(scheduler.status(1), Some(JobStatus::Success));
    assert_eq!(scheduler.status(0), Some(JobStatus::InExec));

    env.set_time(15.);
    assert_eq!(scheduler.update_vm_processing(15., &[1000.]), 0.);
    assert_eq!(scheduler.status(0), Some(JobStatus::Success));
}

#[test]
fn prediction_respects_min_time_between_events() {
    let env = Environment::new(0.5);
    let mut scheduler = scheduler(&env, "TimeShared", 1000., 1);
    scheduler.update_vm_processing(0., &[1000.]);
    scheduler.submit(job(0, 100, 1), 0.);
    env.set_time(0.05);
    // 50 MI left need 0.05 time units which is closer than allowed
    assert_float_eq(scheduler.update_vm_processing(0.05, &[1000.]), 0.55, 1e-12);
}

#[rstest]
#[case("TimeShared")]
#[case("SpaceShared")]
fn canceled_job_keeps_progress(#[case] policy: &str) {
    let env = Environment::new(0.1);
    let mut scheduler = scheduler(&env, policy, 1000., 1);
    scheduler.update_vm_processing(0., &[1000.]);
    scheduler.submit(job(0, 10_000, 1), 0.);

    env.set_time(4.);
    scheduler.update_vm_processing(4., &[1000.]);
    let canceled = scheduler.cancel(0).unwrap();
    assert_eq!(canceled.status(), JobStatus::Canceled);
    assert_eq!(canceled.finished_so_far(), 4_000);
    assert_eq!(scheduler.status(0), None);
    assert!(scheduler.cancel(0).is_none());
    assert_eq!(scheduler.running_jobs(), 0);
}

#[test]
fn paused_job_resumes_with_remaining_length() {
    let env = Environment::new(0.1);
    let mut scheduler = scheduler(&env, "TimeShared", 1000., 1);
    scheduler.update_vm_processing(0., &[1000.]);
    scheduler.submit(job(0, 10_000, 1), 0.);

    env.set_time(2.);
    scheduler.update_vm_processing(2., &[1000.]);
    assert!(scheduler.pause(0));
    assert!(!scheduler.pause(7));
    assert_eq!(scheduler.status(0), Some(JobStatus::Paused));

    env.set_time(5.);
    assert_eq!(scheduler.update_vm_processing(5., &[1000.]), 0.);
    assert_float_eq(scheduler.resume(0), 13., 1e-12);
    assert_eq!(scheduler.status(0), Some(JobStatus::Resumed));
    assert_eq!(scheduler.resume(0), 0.);

    env.set_time(13.);
    scheduler.update_vm_processing(13., &[1000.]);
    let finished = scheduler.take_next_finished_job().unwrap();
    assert_eq!(finished.status(), JobStatus::Success);
    assert_float_eq(finished.actual_cpu_time(), 10., 1e-12);
}

#[test]
fn single_service_requests_utilized_mips() {
    let env = Environment::new(0.1);
    let mut scheduler = scheduler(&env, "SingleServiceWorkload", 1000., 2);
    scheduler.update_vm_processing(0., &[1000., 1000.]);
    let job = Job::with_utilization_models(
        0,
        10_000,
        1,
        boxed!(ConstantUtilizationModel::new(0.5)),
        boxed!(FullUtilizationModel),
        boxed!(FullUtilizationModel),
    )
    .unwrap();

    assert_float_eq(scheduler.submit(job, 0.), 10., 1e-12);
    assert_eq!(scheduler.current_requested_mips(), vec![500., 500.]);
    assert_float_eq(scheduler.total_current_allocated_mips_for_job(0, 0.), 1000., 1e-12);
    assert_float_eq(scheduler.total_utilization_of_cpu(0.), 0.5, 1e-12);
}

#[test]
fn unknown_policy_is_rejected() {
    let env = Environment::new(0.1);
    assert!(job_scheduler_resolver("RoundRobin", env.create_context("vm"), 1000., 1).is_err());
    assert!(job_scheduler_resolver("SpaceShared[]", env.create_context("vm"), 1000., 1).is_ok());
}
