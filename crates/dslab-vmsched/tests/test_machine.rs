use std::io::Write;

use env_logger::Builder;
use rstest::rstest;
use sugars::boxed;

use dslab_vmsched::job::{Job, JobStatus};
use dslab_vmsched::job_scheduler::job_scheduler_resolver;
use dslab_vmsched::machine::{AllocationVerdict, Machine, MachineKind, VmCreation};
use dslab_vmsched::slot::{make_slots, SlotStatus};
use dslab_vmsched::utilization_model::{ConstantUtilizationModel, FullUtilizationModel};
use dslab_vmsched::vm::VirtualMachine;
use dslab_vmsched::vm_scheduler::vm_scheduler_resolver;
use dslab_vmsched::{Environment, SchedulingError};

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(
        (x - y).abs() < eps || (x.max(y) - x.min(y)) / x.min(y) < eps,
        "Values do not match: {:.15} vs {:.15}",
        x,
        y
    );
}

fn init_logger() {
    // several tests share the process, only the first one installs the logger
    let _ = Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

fn machine(env: &Environment, id: u32, slots: u32, mips: f64, ram: u64, kind: MachineKind) -> Machine {
    init_logger();
    let vm_scheduler = vm_scheduler_resolver("TimeShared", make_slots(slots, mips)).unwrap();
    Machine::new(
        id,
        ram,
        1000,
        100_000,
        vm_scheduler,
        kind,
        env.create_context(format!("machine-{}", id)),
    )
    .with_cost_per_sec(3.)
}

#[allow(clippy::too_many_arguments)]
fn vm(env: &Environment, id: u32, mips: f64, slots: u32, ram: u64, bw: u64, size: u64, policy: &str) -> VirtualMachine {
    let scheduler = job_scheduler_resolver(policy, env.create_context(format!("vm-{}", id)), mips, slots).unwrap();
    VirtualMachine::new(id, 0, mips, slots, ram, bw, size, "Xen", scheduler)
}

fn half_loaded_job(id: u64, length: u64) -> Job {
    Job::with_utilization_models(
        id,
        length,
        1,
        boxed!(ConstantUtilizationModel::new(0.5)),
        boxed!(FullUtilizationModel),
        boxed!(FullUtilizationModel),
    )
    .unwrap()
}

#[test]
fn job_runs_to_completion_on_machine() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 1, 1000., 4096, MachineKind::Simple);
    let created = machine
        .create_vm(vm(&env, 0, 1000., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    assert!(created.is_created());
    assert_eq!(machine.vm("0-0").unwrap().host(), Some(0));
    assert_eq!(machine.number_of_busy_slots(), 1);

    let estimate = machine.submit_job("0-0", Job::new(0, 10_000, 1).unwrap(), 0.);
    assert_float_eq(estimate.unwrap(), 10., 1e-12);
    assert_eq!(machine.job_status("0-0", 0), Some(JobStatus::InExec));
    assert!(machine.submit_job("5-5", Job::new(1, 10, 1).unwrap(), 0.).is_none());

    env.set_time(10.);
    assert_eq!(machine.update_all_vms_processing(10.).unwrap(), f64::MAX);
    let finished = machine.take_finished_jobs();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].status(), JobStatus::Success);
    assert_eq!(finished[0].finished_so_far(), 10_000);
    assert_eq!(finished[0].executions()[0].machine_name, "machine-0");
    assert_float_eq(finished[0].processing_cost(), 30., 1e-12);
    assert!(!machine.has_finished_jobs());
}

#[test]
fn earliest_completion_is_reported() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 2, 1000., 4096, MachineKind::Simple);
    for id in 0..2 {
        let created = machine
            .create_vm(vm(&env, id, 1000., 1, 1024, 100, 1000, "TimeShared"))
            .unwrap();
        assert!(created.is_created());
    }
    machine.submit_job("0-0", Job::new(0, 10_000, 1).unwrap(), 0.);
    machine.submit_job("0-1", Job::new(1, 4_000, 1).unwrap(), 0.);

    env.set_time(1.);
    assert_float_eq(machine.update_all_vms_processing(1.).unwrap(), 4., 1e-12);
}

#[rstest]
#[case(1000., 1024, 100, 200_000, AllocationVerdict::NotEnoughStorage)]
#[case(1000., 8192, 100, 1000, AllocationVerdict::NotEnoughRam)]
#[case(1000., 1024, 5000, 1000, AllocationVerdict::NotEnoughBandwidth)]
#[case(1500., 1024, 100, 1000, AllocationVerdict::NotEnoughSlots)]
fn rejected_vm_leaves_machine_untouched(
    #[case] mips: f64,
    #[case] ram: u64,
    #[case] bw: u64,
    #[case] size: u64,
    #[case] expected: AllocationVerdict,
) {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 2, 1000., 4096, MachineKind::Simple);
    let candidate = vm(&env, 0, mips, 1, ram, bw, size, "TimeShared");
    assert!(!machine.is_suitable_for_vm(&candidate) || expected == AllocationVerdict::NotEnoughStorage);
    match machine.create_vm(candidate).unwrap() {
        VmCreation::Rejected(verdict, vm) => {
            assert_eq!(verdict, expected);
            assert_eq!(vm.host(), None);
        }
        VmCreation::Created => panic!("vm must be rejected"),
    }
    assert_eq!(machine.vm_count(), 0);
    assert_eq!(machine.ram().available(), 4096);
    assert_eq!(machine.bw().available(), 1000);
    assert_eq!(machine.free_storage(), 100_000);
    assert_eq!(machine.available_mips(), 2000.);
}

#[test]
fn destroyed_vm_returns_resources() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 2, 1000., 4096, MachineKind::Simple);
    machine
        .create_vm(vm(&env, 0, 1000., 2, 1024, 100, 1000, "SpaceShared"))
        .unwrap();
    assert_eq!(machine.ram().available(), 3072);
    assert_eq!(machine.free_storage(), 99_000);

    let destroyed = machine.destroy_vm("0-0").unwrap().unwrap();
    assert_eq!(destroyed.host(), None);
    assert!(destroyed.current_allocated_mips().is_empty());
    assert_eq!(machine.available_mips(), 2000.);
    assert_eq!(machine.ram().available(), 4096);
    assert_eq!(machine.free_storage(), 100_000);
    assert_eq!(machine.number_of_free_slots(), 2);
    assert!(machine.destroy_vm("0-0").unwrap().is_none());
}

#[test]
fn destroy_all_vms_keeps_migration_reservations() {
    let env = Environment::new(0.1);
    let mut source = machine(&env, 0, 2, 1000., 4096, MachineKind::Simple);
    let mut machine = machine(&env, 1, 2, 1000., 4096, MachineKind::Simple);
    source
        .create_vm(vm(&env, 0, 1000., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    machine
        .create_vm(vm(&env, 1, 1000., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    machine.add_migrating_in(source.vm("0-0").unwrap()).unwrap();

    let destroyed = machine.destroy_all_vms().unwrap();
    assert_eq!(destroyed.len(), 1);
    assert_eq!(machine.vm_count(), 0);
    assert!(machine.is_migrating_in("0-0"));
    assert_eq!(machine.allocated_mips_for_vm("0-0"), Some(&[100.][..]));
    assert_eq!(machine.free_storage(), 99_000);
}

#[test]
fn migration_taxes_both_machines() {
    let env = Environment::new(0.1);
    let mut source = machine(&env, 0, 2, 1000., 4096, MachineKind::Simple);
    let mut destination = machine(&env, 1, 2, 1000., 4096, MachineKind::Simple);
    source
        .create_vm(vm(&env, 0, 1000., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    source.submit_job("0-0", Job::new(0, 10_000, 1).unwrap(), 0.);

    destination.add_migrating_in(source.vm("0-0").unwrap()).unwrap();
    assert!(destination.is_migrating_in("0-0"));
    assert_eq!(destination.allocated_mips_for_vm("0-0"), Some(&[100.][..]));
    assert_eq!(destination.available_mips(), 1900.);
    assert_eq!(destination.free_storage(), 99_000);

    assert!(source.start_migration_out("0-0").unwrap());
    assert_eq!(source.allocated_mips_for_vm("0-0"), Some(&[900.][..]));

    env.set_time(2.);
    source.update_all_vms_processing(2.).unwrap();
    let migrated = source.destroy_vm("0-0").unwrap().unwrap();
    assert!(source.vm_scheduler().migrating_out().is_empty());
    assert_eq!(source.available_mips(), 2000.);

    assert!(destination.complete_migration_in(migrated).unwrap().is_created());
    assert!(!destination.is_migrating_in("0-0"));
    let vm = destination.vm("0-0").unwrap();
    assert_eq!(vm.host(), Some(1));
    assert!(!vm.is_in_migration());
    assert_eq!(vm.running_jobs(), 1);
    assert_eq!(destination.allocated_mips_for_vm("0-0"), Some(&[1000.][..]));
    assert_eq!(destination.free_storage(), 99_000);
}

#[test]
fn migration_without_resources_is_an_error() {
    let env = Environment::new(0.1);
    let mut source = machine(&env, 0, 2, 1000., 4096, MachineKind::Simple);
    let mut destination = machine(&env, 1, 2, 1000., 512, MachineKind::Simple);
    source
        .create_vm(vm(&env, 0, 1000., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    source.submit_job("0-0", Job::new(0, 10_000, 1).unwrap(), 0.);

    let result = destination.add_migrating_in(source.vm("0-0").unwrap());
    assert_eq!(
        result,
        Err(SchedulingError::MigrationAdmission {
            vm: "0-0".to_string(),
            machine_id: 1,
            resource: "RAM",
        })
    );
    assert!(!destination.is_migrating_in("0-0"));
    assert!(destination.vm_scheduler().migrating_in().is_empty());
    assert_eq!(destination.ram().available(), 512);
}

#[rstest]
#[case(1000., 2048, 100, "RAM")]
#[case(1000., 1024, 1000, "bandwidth")]
#[case(1500., 1024, 100, "MIPS")]
fn grown_reservation_which_does_not_fit_is_an_error(
    #[case] mips: f64,
    #[case] ram: u64,
    #[case] bw: u64,
    #[case] resource: &'static str,
) {
    let env = Environment::new(0.1);
    let mut destination = machine(&env, 1, 2, 1000., 2048, MachineKind::Simple);
    destination
        .create_vm(vm(&env, 1, 1000., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    let migrating = vm(&env, 0, 1000., 1, 1024, 100, 1000, "TimeShared");
    destination.add_migrating_in(&migrating).unwrap();
    assert_eq!(destination.ram().available(), 0);
    destination.reallocate_migrating_in_vms().unwrap();

    destination.refresh_migrating_in(&vm(&env, 0, mips, 1, ram, bw, 1000, "TimeShared"));
    assert_eq!(
        destination.reallocate_migrating_in_vms(),
        Err(SchedulingError::MigrationAdmission {
            vm: "0-0".to_string(),
            machine_id: 1,
            resource,
        })
    );
}

#[test]
fn dynamic_machine_follows_demand() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 2, 1000., 4096, MachineKind::DynamicWorkload);
    machine
        .create_vm(vm(&env, 0, 1000., 2, 1024, 100, 1000, "SingleServiceWorkload"))
        .unwrap();
    assert_eq!(machine.completed_vms().len(), 1);
    assert_float_eq(machine.submit_job("0-0", half_loaded_job(0, 100_000), 0.).unwrap(), 100., 1e-12);

    env.set_time(1.);
    machine.update_all_vms_processing(1.).unwrap();
    assert_eq!(machine.allocated_mips_for_vm("0-0"), Some(&[500., 500.][..]));
    assert_float_eq(machine.utilization_mips(), 1000., 1e-12);
    assert_float_eq(machine.utilization_of_cpu(), 0.5, 1e-12);
    assert_eq!(machine.under_allocated_mips("0-0"), 0.);
    assert!(machine.completed_vms().is_empty());

    // repeated update at the same time replaces the history entries
    machine.update_all_vms_processing(1.).unwrap();
    assert_eq!(machine.state_history().len(), 1);
    assert_eq!(machine.vm("0-0").unwrap().state_history().len(), 1);
    assert_float_eq(machine.previous_utilization_mips(), 1000., 1e-12);

    env.set_time(2.);
    machine.update_all_vms_processing(2.).unwrap();
    let history = machine.state_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].time, 2.);
    assert_float_eq(history[1].requested_mips, 1000., 1e-12);
    assert!(history[1].is_active);
}

#[test]
fn vm_without_allocation_makes_no_progress() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 1, 1000., 4096, MachineKind::DynamicWorkload);
    machine
        .create_vm(vm(&env, 0, 1000., 1, 1024, 100, 1000, "SingleServiceWorkload"))
        .unwrap();
    // idle VM requests nothing and leaves the slot to the second one
    machine.update_all_vms_processing(0.).unwrap();
    assert_eq!(machine.allocated_mips_for_vm("0-0"), Some(&[0.][..]));
    assert!(machine
        .create_vm(vm(&env, 1, 1000., 1, 1024, 100, 1000, "SingleServiceWorkload"))
        .unwrap()
        .is_created());
    machine.submit_job("0-1", Job::new(1, 10_000, 1).unwrap(), 0.);
    machine.submit_job("0-0", Job::new(0, 10_000, 1).unwrap(), 0.);

    // the first VM takes the whole slot back
    env.set_time(1.);
    machine.update_all_vms_processing(1.).unwrap();
    assert_eq!(machine.allocated_mips_for_vm("0-1"), None);
    env.set_time(2.);
    machine.update_all_vms_processing(2.).unwrap();
    assert_eq!(machine.allocated_mips_for_vm("0-1"), None);

    env.set_time(3.);
    machine.cancel_job("0-0", 0).unwrap();
    machine.update_all_vms_processing(3.).unwrap();
    assert_eq!(machine.allocated_mips_for_vm("0-1"), Some(&[1000.][..]));

    env.set_time(4.);
    machine.update_all_vms_processing(4.).unwrap();
    let job = machine.cancel_job("0-1", 1).unwrap();
    assert_eq!(job.status(), JobStatus::Canceled);
    assert_eq!(job.finished_so_far(), 2_000);
}

#[test]
fn migrating_out_vm_is_discounted_twice_on_dynamic_machine() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 2, 1000., 4096, MachineKind::DynamicWorkload);
    machine
        .create_vm(vm(&env, 0, 1000., 2, 1024, 100, 1000, "SingleServiceWorkload"))
        .unwrap();
    machine.submit_job("0-0", half_loaded_job(0, 100_000), 0.);
    env.set_time(1.);
    machine.update_all_vms_processing(1.).unwrap();

    assert!(machine.start_migration_out("0-0").unwrap());
    env.set_time(2.);
    machine.update_all_vms_processing(2.).unwrap();
    assert_eq!(machine.allocated_mips_for_vm("0-0"), Some(&[450., 450.][..]));
    let entry = machine.vm("0-0").unwrap().state_history().last().unwrap().clone();
    assert_float_eq(entry.allocated_mips, 900., 1e-12);
    assert!(entry.is_in_migration);
    assert_float_eq(machine.utilization_mips(), 810., 1e-9);
}

#[test]
fn failed_machine_marks_all_slots() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 3, 1000., 4096, MachineKind::Simple);
    machine
        .create_vm(vm(&env, 0, 1000., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    machine.set_failed(true);
    assert!(machine.is_failed());
    assert_eq!(machine.number_of_free_slots(), 0);
    assert_eq!(machine.number_of_busy_slots(), 0);

    machine.set_failed(false);
    assert_eq!(machine.number_of_busy_slots(), 1);
    assert_eq!(machine.number_of_free_slots(), 2);
    assert!(machine.set_slot_status(2, SlotStatus::Failed));
    assert_eq!(machine.number_of_free_slots(), 1);
}

#[test]
fn utilization_of_slots() {
    let env = Environment::new(0.1);
    let mut machine = machine(&env, 0, 2, 1000., 4096, MachineKind::Simple);
    machine
        .create_vm(vm(&env, 0, 500., 1, 1024, 100, 1000, "TimeShared"))
        .unwrap();
    assert_float_eq(machine.max_utilization(), 0.5, 1e-12);
    assert_float_eq(machine.max_utilization_among_vm_slots("0-0"), 0.5, 1e-12);
    assert_eq!(machine.max_utilization_among_vm_slots("1-1"), 0.);
    assert_eq!(machine.utilization_of_ram(), 1024);
    assert_eq!(machine.utilization_of_bw(), 100);
}
