mod arithmetic;
mod branches;
mod control_flow;
mod loads_stores;
