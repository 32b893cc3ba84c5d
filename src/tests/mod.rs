// Test modules for the timer registry
//
// 定时器注册表测试模块

mod support;

mod registry {
    mod cancel_tests;
    mod dispatch_tests;
    mod schedule_tests;
    mod shutdown_tests;
}
